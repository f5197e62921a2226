use crate::types::{
    Answer, AnswerValue, DisplayMode, Feedback, FeedbackPatch, Question, Solution, WidgetConfig,
    WidgetConfigPatch, WidgetState, WizardStep,
};
use serde::Serialize;
use tracing::debug;

/// Wizard state for one widget instance.
///
/// Setters are plain assignments; nothing here checks step order or
/// answer values. Derived views are recomputed on every read.
#[derive(Debug, Clone, Default)]
pub struct WidgetStore {
    state: WidgetState,
    config: WidgetConfig,
}

impl WidgetStore {
    pub fn new(config: WidgetConfig) -> Self {
        Self {
            state: WidgetState::default(),
            config,
        }
    }

    pub fn state(&self) -> &WidgetState {
        &self.state
    }

    pub fn config(&self) -> &WidgetConfig {
        &self.config
    }

    pub fn current_step(&self) -> WizardStep {
        self.state.current_step
    }

    pub fn answers(&self) -> &[Answer] {
        &self.state.answers
    }

    pub fn current_questions(&self) -> &[Question] {
        &self.state.current_questions
    }

    pub fn current_solution(&self) -> Option<&Solution> {
        self.state.current_solution.as_ref()
    }

    pub fn feedback(&self) -> &Feedback {
        &self.state.feedback
    }

    pub fn display_mode(&self) -> DisplayMode {
        self.state.display_mode
    }

    pub fn is_open(&self) -> bool {
        self.state.is_open
    }

    pub fn answer_for(&self, question_id: &str) -> Option<&Answer> {
        self.state
            .answers
            .iter()
            .find(|a| a.question_id == question_id)
    }

    pub fn set_problem_description(&mut self, description: impl Into<String>) {
        self.state.problem_description = description.into();
    }

    pub fn set_current_questions(&mut self, questions: Vec<Question>) {
        self.state.current_questions = questions;
    }

    /// Insert or replace by question id. A replacement keeps its slot.
    pub fn add_answer(&mut self, answer: Answer) {
        match self
            .state
            .answers
            .iter_mut()
            .find(|a| a.question_id == answer.question_id)
        {
            Some(existing) => *existing = answer,
            None => self.state.answers.push(answer),
        }
    }

    pub fn update_answer(
        &mut self,
        question_id: &str,
        value: impl Into<AnswerValue>,
        label: Option<String>,
    ) {
        self.add_answer(Answer::new(question_id, value, label));
    }

    pub fn remove_answer(&mut self, question_id: &str) {
        self.state.answers.retain(|a| a.question_id != question_id);
    }

    pub fn set_current_solution(&mut self, solution: Option<Solution>) {
        self.state.current_solution = solution;
    }

    pub fn set_feedback(&mut self, patch: FeedbackPatch) {
        self.state.feedback.merge(patch);
    }

    pub fn set_current_step(&mut self, step: WizardStep) {
        self.state.current_step = step;
    }

    pub fn set_display_mode(&mut self, mode: DisplayMode) {
        self.state.display_mode = mode;
    }

    pub fn update_config(&mut self, patch: WidgetConfigPatch) {
        self.config.merge(patch);
        debug!(config = ?self.config, "widget config updated");
    }

    pub fn toggle_open(&mut self) -> bool {
        self.state.is_open = !self.state.is_open;
        self.state.is_open
    }

    /// Back to a fresh wizard. Config, display mode and open state survive.
    pub fn reset(&mut self) {
        let display_mode = self.state.display_mode;
        let is_open = self.state.is_open;
        self.state = WidgetState {
            display_mode,
            is_open,
            ..WidgetState::default()
        };
    }

    fn is_answered(&self, question: &Question) -> bool {
        self.state
            .answers
            .iter()
            .any(|a| a.question_id == question.id)
    }

    pub fn answered_questions(&self) -> Vec<&Question> {
        self.state
            .current_questions
            .iter()
            .filter(|q| self.is_answered(q))
            .collect()
    }

    pub fn unanswered_questions(&self) -> Vec<&Question> {
        self.state
            .current_questions
            .iter()
            .filter(|q| !self.is_answered(q))
            .collect()
    }

    /// Depends only on how many answers exist, not which questions they cover.
    pub fn can_show_solution(&self) -> bool {
        self.state.answers.len() >= self.config.max_questions_before_solution
    }

    /// Index into `unanswered_questions` of the question to present next.
    /// Only meaningful in sequential mode; batch mode always yields `None`.
    pub fn current_question_index(&self) -> Option<usize> {
        match self.state.display_mode {
            DisplayMode::Sequential if !self.unanswered_questions().is_empty() => Some(0),
            _ => None,
        }
    }

    pub fn snapshot(&self) -> WidgetSnapshot {
        WidgetSnapshot {
            state: self.state.clone(),
            config: self.config.clone(),
            answered_question_ids: self
                .answered_questions()
                .into_iter()
                .map(|q| q.id.clone())
                .collect(),
            unanswered_question_ids: self
                .unanswered_questions()
                .into_iter()
                .map(|q| q.id.clone())
                .collect(),
            can_show_solution: self.can_show_solution(),
            current_question_index: self
                .current_question_index()
                .map(|i| i as i64)
                .unwrap_or(-1),
        }
    }
}

/// State plus derived views as the iframe page consumes them.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetSnapshot {
    #[serde(flatten)]
    pub state: WidgetState,
    pub config: WidgetConfig,
    pub answered_question_ids: Vec<String>,
    pub unanswered_question_ids: Vec<String>,
    pub can_show_solution: bool,
    /// `-1` when there is nothing to present or in batch mode.
    pub current_question_index: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Priority, QuestionKind};
    use std::collections::HashSet;

    fn questions(ids: &[&str]) -> Vec<Question> {
        ids.iter()
            .map(|id| Question::new(id, QuestionKind::FreeText, id))
            .collect()
    }

    #[test]
    fn add_answer_upserts_in_place() {
        let mut store = WidgetStore::default();
        store.update_answer("device", "laptop", None);
        store.update_answer("urgency", "low", Some("Low".into()));
        store.update_answer("device", "phone", Some("Phone".into()));

        let answers = store.answers();
        assert_eq!(answers.len(), 2);
        assert_eq!(answers[0].question_id, "device");
        assert!(answers[0].value.is_text("phone"));
        assert_eq!(answers[0].label.as_deref(), Some("Phone"));
        assert_eq!(answers[1].question_id, "urgency");
    }

    #[test]
    fn last_write_per_question_wins_over_long_sequences() {
        let mut store = WidgetStore::default();
        let ids = ["a", "b", "c"];
        for round in 0..30u32 {
            let id = ids[(round as usize * 7) % ids.len()];
            store.update_answer(id, f64::from(round), None);
        }
        let unique: HashSet<_> = store.answers().iter().map(|a| &a.question_id).collect();
        assert_eq!(unique.len(), store.answers().len());
        // round 29 -> 29*7 % 3 == 2 -> "c"
        let last_c = store.answer_for("c").unwrap();
        assert_eq!(last_c.value, AnswerValue::Number(29.0));
    }

    #[test]
    fn remove_answer_drops_only_that_question() {
        let mut store = WidgetStore::default();
        store.update_answer("a", "1", None);
        store.update_answer("b", "2", None);
        store.remove_answer("a");
        store.remove_answer("missing");
        assert_eq!(store.answers().len(), 1);
        assert!(store.answer_for("b").is_some());
    }

    #[test]
    fn can_show_solution_counts_any_answers() {
        let mut store = WidgetStore::default();
        store.set_current_questions(questions(&["a"]));
        store.update_answer("x", "1", None);
        store.update_answer("y", "1", None);
        assert!(!store.can_show_solution());
        // answers to questions outside the current set still count
        store.update_answer("z", "1", None);
        assert!(store.can_show_solution());

        store.update_config(WidgetConfigPatch {
            max_questions_before_solution: Some(4),
            ..Default::default()
        });
        assert!(!store.can_show_solution());
    }

    #[test]
    fn answered_and_unanswered_partition_current_questions() {
        let mut store = WidgetStore::default();
        store.set_current_questions(questions(&["a", "b", "c", "d"]));
        store.update_answer("b", "yes", None);
        store.update_answer("d", "no", None);
        store.update_answer("zzz", "stray", None);

        let answered: HashSet<_> = store
            .answered_questions()
            .iter()
            .map(|q| q.id.clone())
            .collect();
        let unanswered: HashSet<_> = store
            .unanswered_questions()
            .iter()
            .map(|q| q.id.clone())
            .collect();
        let all: HashSet<_> = store.current_questions().iter().map(|q| q.id.clone()).collect();

        assert!(answered.is_disjoint(&unanswered));
        assert_eq!(&answered | &unanswered, all);
        assert_eq!(answered, HashSet::from(["b".to_string(), "d".to_string()]));
    }

    #[test]
    fn current_question_index_depends_on_mode() {
        let mut store = WidgetStore::default();
        assert_eq!(store.current_question_index(), None);

        store.set_current_questions(questions(&["a", "b"]));
        assert_eq!(store.current_question_index(), Some(0));

        store.set_display_mode(DisplayMode::Batch);
        assert_eq!(store.current_question_index(), None);
        assert_eq!(store.snapshot().current_question_index, -1);

        store.set_display_mode(DisplayMode::Sequential);
        store.update_answer("a", "1", None);
        store.update_answer("b", "1", None);
        assert_eq!(store.current_question_index(), None);
    }

    #[test]
    fn reset_reverts_wizard_fields_only() {
        let mut store = WidgetStore::default();
        store.set_current_step(WizardStep::Feedback);
        store.set_problem_description("printer on fire");
        store.set_current_questions(questions(&["a"]));
        store.update_answer("a", "1", None);
        store.set_current_solution(Some(Solution {
            id: "solution-1".into(),
            title: "t".into(),
            description: "d".into(),
            steps: vec![],
            priority: Priority::High,
        }));
        store.set_feedback(FeedbackPatch {
            helpful: Some(Some(true)),
            rating: Some(5),
            comment: Some("great".into()),
        });
        store.set_display_mode(DisplayMode::Batch);
        store.update_config(WidgetConfigPatch {
            primary_color: Some("#000000".into()),
            ..Default::default()
        });
        store.toggle_open();
        let config_before = store.config().clone();

        store.reset();

        let state = store.state();
        assert_eq!(state.current_step, WizardStep::Problem);
        assert_eq!(state.problem_description, "");
        assert!(state.current_questions.is_empty());
        assert!(state.answers.is_empty());
        assert_eq!(state.current_solution, None);
        assert_eq!(state.feedback, Feedback::default());
        assert_eq!(state.display_mode, DisplayMode::Batch);
        assert!(state.is_open);
        assert_eq!(store.config(), &config_before);
    }

    #[test]
    fn set_feedback_merges_shallowly() {
        let mut store = WidgetStore::default();
        store.set_feedback(FeedbackPatch {
            helpful: Some(Some(false)),
            ..Default::default()
        });
        store.set_feedback(FeedbackPatch {
            comment: Some("still broken".into()),
            ..Default::default()
        });
        assert_eq!(store.feedback().helpful, Some(false));
        assert_eq!(store.feedback().comment.as_deref(), Some("still broken"));
    }

    #[test]
    fn steps_can_be_set_in_any_order() {
        let mut store = WidgetStore::default();
        store.set_current_step(WizardStep::Solution);
        store.set_current_step(WizardStep::Problem);
        store.set_current_step(WizardStep::Feedback);
        assert_eq!(store.current_step(), WizardStep::Feedback);
    }

    #[test]
    fn snapshot_serializes_flat_camel_case() {
        let mut store = WidgetStore::default();
        store.set_current_questions(questions(&["a"]));
        let value = serde_json::to_value(store.snapshot()).unwrap();
        assert_eq!(value["currentStep"], "problem");
        assert_eq!(value["displayMode"], "sequential");
        assert_eq!(value["currentQuestionIndex"], 0);
        assert_eq!(value["unansweredQuestionIds"][0], "a");
        assert_eq!(value["feedback"]["helpful"], serde_json::Value::Null);
        assert_eq!(value["config"]["maxQuestionsBeforeSolution"], 3);
    }
}
