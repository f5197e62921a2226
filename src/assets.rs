//! Browser-side pieces: the host-page loader script and the iframe app page.
//!
//! Both are templates filled from the Rust definitions so defaults, element
//! ids and the data-attribute list cannot drift from the loader model.

use crate::loader::{
    CONTAINER_ID, DATA_ATTRIBUTES, FAB_ID, FAB_STYLE, IFRAME_STYLE, LoaderConfig,
};
use crate::types::WidgetConfig;

fn css_text(rules: &[(&str, &str)]) -> String {
    rules
        .iter()
        .map(|(property, value)| format!("{property}: {value};"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn json_or_null<T: serde::Serialize>(value: &T) -> String {
    // `</` would end the surrounding <script> element early.
    serde_json::to_string(value)
        .unwrap_or_else(|_| "null".to_string())
        .replace("</", "<\\/")
}

/// camelCase dataset keys for the data attributes (`data-font-size` → `fontSize`).
fn dataset_keys() -> Vec<String> {
    DATA_ATTRIBUTES
        .iter()
        .map(|attr| {
            let mut out = String::new();
            let mut upper = false;
            for ch in attr.trim_start_matches("data-").chars() {
                if ch == '-' {
                    upper = true;
                } else if upper {
                    out.extend(ch.to_uppercase());
                    upper = false;
                } else {
                    out.push(ch);
                }
            }
            out
        })
        .collect()
}

const LOADER_TEMPLATE: &str = r#"// Guidance widget loader
(function(global) {
  'use strict';

  const defaultConfig = __DEFAULTS__;
  const datasetKeys = __DATASET_KEYS__;
  const iframeStyle = __IFRAME_STYLE__;
  const fabStyle = __FAB_STYLE__;

  // Scheme, host and port only, as MessageEvent.origin reports them.
  function originOf(url) {
    try {
      return new URL(url, global.location.href).origin;
    } catch (err) {
      return url;
    }
  }

  class GuidanceWidgetLoader {
    constructor(options = {}) {
      this.config = Object.assign({}, defaultConfig, options);
      this.widgetUrl = String(this.config.widgetUrl).replace(/\/+$/, '');
      this.widgetOrigin = originOf(this.widgetUrl);
      this.isLoaded = false;
      this.iframe = null;
      this.fab = null;
      this.onMessage = this.handleMessage.bind(this);
    }

    init() {
      if (this.isLoaded) {
        console.warn('GuidanceWidget is already loaded');
        return;
      }
      let container = document.getElementById('__CONTAINER_ID__');
      if (!container) {
        container = document.createElement('div');
        container.id = '__CONTAINER_ID__';
        document.body.appendChild(container);
      }

      this.iframe = document.createElement('iframe');
      this.iframe.src = this.widgetUrl + '/widget';
      this.iframe.style.cssText = iframeStyle;
      container.appendChild(this.iframe);

      const fab = document.createElement('div');
      fab.id = '__FAB_ID__';
      fab.textContent = '?';
      fab.style.cssText = fabStyle;
      fab.style.backgroundColor = this.config.primaryColor;
      fab.style.fontFamily = this.config.fontFamily;
      fab.addEventListener('mouseenter', () => {
        fab.style.transform = 'scale(1.05)';
        fab.style.boxShadow = '0 6px 16px rgba(0, 0, 0, 0.2)';
      });
      fab.addEventListener('mouseleave', () => {
        fab.style.transform = 'scale(1)';
        fab.style.boxShadow = '0 4px 12px rgba(0, 0, 0, 0.15)';
      });
      fab.addEventListener('click', () => this.toggleWidget());
      document.body.appendChild(fab);
      this.fab = fab;

      global.addEventListener('message', this.onMessage);
      this.isLoaded = true;
      console.log('GuidanceWidget loaded successfully');
    }

    toggleWidget() {
      if (this.iframe.style.display === 'none' || !this.iframe.style.display) {
        this.showWidget();
      } else {
        this.hideWidget();
      }
    }

    showWidget() {
      this.iframe.style.display = 'block';
      this.fab.style.display = 'none';
      const { widgetUrl, ...config } = this.config;
      this.sendMessage('init', config);
    }

    hideWidget() {
      this.iframe.style.display = 'none';
      this.fab.style.display = 'flex';
    }

    sendMessage(type, data) {
      if (this.iframe && this.iframe.contentWindow) {
        this.iframe.contentWindow.postMessage({ type, data }, this.widgetOrigin);
      }
    }

    handleMessage(event) {
      if (event.origin !== this.widgetOrigin) {
        return;
      }
      const message = event.data || {};
      switch (message.type) {
        case 'widget-close':
          this.hideWidget();
          break;
        case 'widget-ready':
          console.log('Widget is ready');
          break;
        case 'feedback-submitted':
          console.log('Feedback submitted:', message.data);
          break;
        default:
          console.debug('GuidanceWidget: ignoring message', message.type);
      }
    }

    destroy() {
      if (this.fab) this.fab.remove();
      if (this.iframe) this.iframe.remove();
      global.removeEventListener('message', this.onMessage);
      this.fab = null;
      this.iframe = null;
      this.isLoaded = false;
    }
  }

  global.initGuidanceWidget = function(options) {
    const loader = new GuidanceWidgetLoader(options);
    loader.init();
    return loader;
  };

  const script = document.currentScript || document.querySelector('script[src*="widget.js"]');
  document.addEventListener('DOMContentLoaded', function() {
    if (!script || script.dataset.autoInit !== 'true') {
      return;
    }
    const options = {};
    datasetKeys.forEach(function(key) {
      if (script.dataset[key]) options[key] = script.dataset[key];
    });
    global.initGuidanceWidget(options);
  });
})(window);
"#;

/// Loader script served to host pages, with `defaults` baked in.
pub fn loader_script(defaults: &LoaderConfig) -> String {
    LOADER_TEMPLATE
        .replace("__DEFAULTS__", &json_or_null(defaults))
        .replace("__DATASET_KEYS__", &json_or_null(&dataset_keys()))
        .replace("__IFRAME_STYLE__", &json_or_null(&css_text(IFRAME_STYLE)))
        .replace("__FAB_STYLE__", &json_or_null(&css_text(FAB_STYLE)))
        .replace("__CONTAINER_ID__", CONTAINER_ID)
        .replace("__FAB_ID__", FAB_ID)
}

const WIDGET_PAGE_TEMPLATE: &str = r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Guidance</title>
<style>
  body { margin: 0; font-family: var(--font-family); font-size: var(--font-size); background: var(--secondary); color: #0f172a; }
  header { display: flex; align-items: center; justify-content: space-between; padding: 12px 16px; background: var(--primary); color: white; }
  header img { height: 24px; }
  header button { background: none; border: none; color: white; font-size: 20px; cursor: pointer; }
  main { padding: 16px; }
  .option { display: block; width: 100%; margin: 6px 0; padding: 10px; border-radius: 8px; border: 1px solid #cbd5e1; background: white; text-align: left; cursor: pointer; }
  .option img { height: 24px; vertical-align: middle; margin-right: 8px; }
  .primary { margin-top: 12px; padding: 10px 16px; border: none; border-radius: 8px; background: var(--primary); color: white; cursor: pointer; }
  textarea, input { width: 100%; box-sizing: border-box; padding: 8px; border-radius: 8px; border: 1px solid #cbd5e1; }
  .priority { display: inline-block; padding: 2px 8px; border-radius: 999px; background: #e2e8f0; font-size: 12px; text-transform: uppercase; }
  .error { color: #b91c1c; }
</style>
</head>
<body>
<header><span id="brand"></span><button id="close" aria-label="Close">&times;</button></header>
<main id="app"><p>Loading&hellip;</p></main>
<script>
(function() {
  'use strict';
  const api = '/api/widget/sessions';
  let config = __CONFIG__;
  let session = null;
  let state = null;
  let hostOrigin = null;
  const app = document.getElementById('app');

  // Only widget-ready goes out before the host has introduced itself.
  function post(type, data) {
    if (window.parent === window) return;
    const target = type === 'widget-ready' ? '*' : hostOrigin;
    if (target) window.parent.postMessage({ type, data }, target);
  }

  async function call(method, path, body) {
    const res = await fetch(api + path, {
      method,
      headers: { 'Content-Type': 'application/json' },
      body: body === undefined ? undefined : JSON.stringify(body),
    });
    const json = res.status === 204 ? null : await res.json();
    if (!res.ok) throw new Error((json && json.error) || res.statusText);
    return json;
  }

  function theme() {
    const root = document.documentElement.style;
    root.setProperty('--primary', config.primaryColor);
    root.setProperty('--secondary', config.secondaryColor);
    root.setProperty('--font-family', config.fontFamily);
    root.setProperty('--font-size', config.fontSize);
    const brand = document.getElementById('brand');
    brand.textContent = '';
    if (config.logoUrl) {
      const img = document.createElement('img');
      img.src = config.logoUrl;
      img.alt = config.companyName || '';
      brand.appendChild(img);
    } else {
      brand.textContent = config.companyName || 'How can we help?';
    }
  }

  function el(tag, props, children) {
    const node = Object.assign(document.createElement(tag), props || {});
    (children || []).forEach((c) => node.append(c));
    return node;
  }

  function render() {
    app.textContent = '';
    switch (state.currentStep) {
      case 'problem': return renderProblem();
      case 'questions': return renderQuestions();
      case 'review': return renderReview();
      case 'solution': return renderSolution();
      case 'feedback': return renderFeedback();
    }
  }

  function renderProblem() {
    const text = el('textarea', { rows: 5, value: state.problemDescription, placeholder: 'Describe your problem' });
    const next = el('button', { className: 'primary', textContent: 'Continue' });
    next.onclick = async () => {
      await call('PUT', '/' + session + '/problem', { description: text.value });
      const res = await call('POST', '/' + session + '/questions/next');
      state = res.state;
      await step('questions');
    };
    app.append(el('p', { textContent: 'What can we help you with?' }), text, next);
  }

  function questionView(q) {
    const wrap = el('section', {}, [el('h3', { textContent: q.title })]);
    if (q.description) wrap.append(el('p', { textContent: q.description }));
    const submit = async (value, label) => {
      try {
        const res = await call('POST', '/' + session + '/answers', { questionId: q.id, value, label });
        state = res.state;
        if (state.canShowSolution || state.unansweredQuestionIds.length === 0) {
          const next = await call('POST', '/' + session + '/questions/next');
          state = next.state;
          if (next.solutionReady) return step('review');
        }
        render();
      } catch (err) {
        wrap.append(el('p', { className: 'error', textContent: err.message }));
      }
    };
    if (q.type === 'text-choices' || q.type === 'image-choices') {
      (q.options || []).forEach((opt) => {
        const b = el('button', { className: 'option' });
        if (opt.image) b.append(el('img', { src: opt.image, alt: '' }));
        b.append(opt.label);
        b.onclick = () => submit(opt.id, opt.label);
        wrap.append(b);
      });
    } else {
      const input = q.type === 'numeric'
        ? el('input', { type: 'number' })
        : el('textarea', { rows: 3 });
      const ok = el('button', { className: 'primary', textContent: 'Next' });
      ok.onclick = () => submit(q.type === 'numeric' ? Number(input.value) : input.value);
      wrap.append(input, ok);
    }
    return wrap;
  }

  function renderQuestions() {
    const pending = state.currentQuestions.filter((q) => state.unansweredQuestionIds.includes(q.id));
    if (pending.length === 0) return step('review');
    if (state.displayMode === 'sequential') {
      app.append(questionView(pending[state.currentQuestionIndex]));
    } else {
      pending.forEach((q) => app.append(questionView(q)));
    }
  }

  function renderReview() {
    const list = el('ul');
    state.answers.forEach((a) => list.append(el('li', { textContent: a.questionId + ': ' + (a.label || a.value) })));
    const next = el('button', { className: 'primary', textContent: 'Show solution' });
    next.onclick = () => step('solution');
    app.append(el('h3', { textContent: 'Your answers' }), list, next);
  }

  function renderSolution() {
    const s = state.currentSolution;
    if (!s) {
      app.append(el('p', { textContent: 'We need a little more information.' }));
      const back = el('button', { className: 'primary', textContent: 'Back to questions' });
      back.onclick = () => step('questions');
      return app.append(back);
    }
    const steps = el('ol');
    s.steps.forEach((line) => {
      const li = el('li');
      line.split('**').forEach((part, i) => li.append(i % 2 ? el('strong', { textContent: part }) : part));
      steps.append(li);
    });
    const done = el('button', { className: 'primary', textContent: 'Was this helpful?' });
    done.onclick = () => step('feedback');
    app.append(el('h3', { textContent: s.title }), el('span', { className: 'priority', textContent: s.priority }),
      el('p', { textContent: s.description }), steps, done);
  }

  function renderFeedback() {
    const send = async (helpful) => {
      const comment = text.value || undefined;
      const res = await call('POST', '/' + session + '/feedback', { helpful, comment });
      state = res.state;
      post('feedback-submitted', state.feedback);
      app.textContent = '';
      const again = el('button', { className: 'primary', textContent: 'Start over' });
      again.onclick = async () => { state = (await call('POST', '/' + session + '/reset')).state; render(); };
      app.append(el('p', { textContent: 'Thanks for your feedback!' }), again);
    };
    const text = el('textarea', { rows: 3, placeholder: 'Anything else?' });
    const yes = el('button', { className: 'option', textContent: 'Yes, that solved it' });
    const no = el('button', { className: 'option', textContent: 'No, I still need help' });
    yes.onclick = () => send(true);
    no.onclick = () => send(false);
    app.append(el('h3', { textContent: 'Was this helpful?' }), yes, no, text);
  }

  async function step(name) {
    state = (await call('PUT', '/' + session + '/step', { step: name })).state;
    render();
  }

  async function start(initial) {
    config = Object.assign({}, config, initial || {});
    theme();
    if (!session) {
      const res = await call('POST', '', { config });
      session = res.sessionId;
      state = res.state;
    } else {
      state = (await call('PATCH', '/' + session + '/config', initial || {})).state;
    }
    render();
  }

  document.getElementById('close').onclick = () => post('widget-close');
  window.addEventListener('message', (event) => {
    if (event.source !== window.parent || !event.data || event.data.type !== 'init') return;
    hostOrigin = event.origin;
    start(event.data.data).catch((err) => { app.textContent = err.message; });
  });
  window.addEventListener('beforeunload', () => {
    if (session) fetch(api + '/' + session, { method: 'DELETE', keepalive: true });
  });
  theme();
  post('widget-ready');
  if (window.parent === window) start().catch((err) => { app.textContent = err.message; });
})();
</script>
</body>
</html>
"#;

/// The iframe application page, themed with `config` until `init` arrives.
pub fn widget_page(config: &WidgetConfig) -> String {
    WIDGET_PAGE_TEMPLATE.replace("__CONFIG__", &json_or_null(config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::LoaderOptions;

    #[test]
    fn dataset_keys_are_camel_case() {
        assert_eq!(
            dataset_keys(),
            vec![
                "primaryColor",
                "secondaryColor",
                "fontFamily",
                "fontSize",
                "logoUrl",
                "widgetUrl"
            ]
        );
    }

    #[test]
    fn loader_script_bakes_in_defaults() {
        let config = LoaderConfig::from_options(LoaderOptions {
            widget_url: Some("https://help.example.com".into()),
            ..Default::default()
        })
        .unwrap();
        let script = loader_script(&config);
        assert!(script.contains(r#""widgetUrl":"https://help.example.com""#));
        assert!(script.contains(r##""primaryColor":"#9333ea""##));
        assert!(script.contains(r#""maxQuestionsBeforeSolution":3"#));
        assert!(script.contains("getElementById('guidance-widget')"));
        assert!(script.contains("display: none;"));
        assert!(!script.contains("__"));
        assert!(script.contains("global.initGuidanceWidget"));
    }

    #[test]
    fn loader_script_compares_origins_not_urls() {
        let script = loader_script(&LoaderConfig::default());
        assert!(script.contains("event.origin !== this.widgetOrigin"));
        assert!(script.contains("postMessage({ type, data }, this.widgetOrigin)"));
        assert!(!script.contains("event.origin !== this.widgetUrl"));
    }

    #[test]
    fn widget_page_targets_the_host_origin() {
        let page = widget_page(&WidgetConfig::default());
        assert!(page.contains("hostOrigin = event.origin;"));
        assert!(page.contains("type === 'widget-ready' ? '*' : hostOrigin"));
        assert!(!page.contains("postMessage({ type, data }, '*')"));
    }

    #[test]
    fn widget_page_escapes_script_terminators() {
        let mut config = WidgetConfig::default();
        config.company_name = Some("</script><script>alert(1)".into());
        let page = widget_page(&config);
        assert!(page.contains(r#"<\/script><script>alert(1)"#));
        assert_eq!(page.matches("</script>").count(), 1);
    }
}
