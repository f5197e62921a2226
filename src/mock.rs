//! In-process stand-in for the guidance backend.
//!
//! Questions and solutions come from a [`MockDataset`]; every call waits a
//! fixed [`Latency`] before answering and none of them can fail.

use crate::types::{
    Answer, Feedback, MockApiResponse, Priority, Question, QuestionKind, QuestionOption,
    QuestionValidation, Solution,
};
use async_trait::async_trait;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};

/// Seam between a widget session and whatever answers its questions.
#[async_trait]
pub trait WidgetBackend: Send + Sync {
    async fn next_questions(&self, answers: &[Answer]) -> MockApiResponse;
    async fn store_answer(&self, answer: &Answer);
    async fn store_feedback(&self, feedback: &Feedback);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Latency {
    pub questions: Duration,
    pub answer: Duration,
    pub feedback: Duration,
}

impl Default for Latency {
    fn default() -> Self {
        Self {
            questions: Duration::from_millis(500),
            answer: Duration::from_millis(200),
            feedback: Duration::from_millis(300),
        }
    }
}

impl Latency {
    pub fn none() -> Self {
        Self {
            questions: Duration::ZERO,
            answer: Duration::ZERO,
            feedback: Duration::ZERO,
        }
    }

    /// Default latencies times `factor`. Negative or NaN factors give no
    /// latency; results too large for a `Duration` saturate.
    pub fn scaled(factor: f64) -> Self {
        let base = Self::default();
        let factor = factor.max(0.0);
        Self {
            questions: scale(base.questions, factor),
            answer: scale(base.answer, factor),
            feedback: scale(base.feedback, factor),
        }
    }
}

fn scale(delay: Duration, factor: f64) -> Duration {
    Duration::try_from_secs_f64(delay.as_secs_f64() * factor).unwrap_or(Duration::MAX)
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        sleep(delay).await;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolutionTemplate {
    pub title: String,
    pub steps: Vec<String>,
}

/// `(question, value)` selects a solution template.
#[derive(Debug, Clone)]
pub struct TopicRule {
    pub question_id: String,
    pub value: String,
    pub template: SolutionTemplate,
}

/// `(question, value)` raises the solution priority.
#[derive(Debug, Clone)]
pub struct PriorityRule {
    pub question_id: String,
    pub value: String,
    pub priority: Priority,
}

/// Lookup table from answer values to solution content.
///
/// The first matching topic rule wins; priority is the highest of all
/// matching priority rules, `medium` when none match.
#[derive(Debug, Clone)]
pub struct SolutionTable {
    pub solution_id: String,
    pub description: String,
    pub fallback: SolutionTemplate,
    pub topics: Vec<TopicRule>,
    pub priorities: Vec<PriorityRule>,
    /// Answers needed before a solution is produced at all.
    pub min_answers: usize,
}

fn has_answer(answers: &[Answer], question_id: &str, value: &str) -> bool {
    answers
        .iter()
        .any(|a| a.question_id == question_id && a.value.is_text(value))
}

impl SolutionTable {
    pub fn is_ready(&self, answers: &[Answer]) -> bool {
        answers.len() >= self.min_answers
    }

    pub fn template_for(&self, answers: &[Answer]) -> &SolutionTemplate {
        self.topics
            .iter()
            .find(|rule| has_answer(answers, &rule.question_id, &rule.value))
            .map(|rule| &rule.template)
            .unwrap_or(&self.fallback)
    }

    pub fn priority_for(&self, answers: &[Answer]) -> Priority {
        self.priorities
            .iter()
            .filter(|rule| has_answer(answers, &rule.question_id, &rule.value))
            .map(|rule| rule.priority)
            .max()
            .unwrap_or_default()
    }

    pub fn resolve(&self, answers: &[Answer]) -> Option<Solution> {
        if !self.is_ready(answers) {
            return None;
        }
        let template = self.template_for(answers);
        Some(Solution {
            id: self.solution_id.clone(),
            title: template.title.clone(),
            description: self.description.clone(),
            steps: template.steps.clone(),
            priority: self.priority_for(answers),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DatasetKind {
    #[default]
    Policy,
    Device,
}

impl FromStr for DatasetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "policy" => Ok(Self::Policy),
            "device" => Ok(Self::Device),
            other => Err(format!("unknown dataset {other:?} (expected policy or device)")),
        }
    }
}

/// Question set plus the table that turns answers into a solution.
#[derive(Debug, Clone)]
pub struct MockDataset {
    pub name: String,
    pub questions: Vec<Question>,
    pub solutions: SolutionTable,
}

fn template(title: &str, steps: &[&str]) -> SolutionTemplate {
    SolutionTemplate {
        title: title.to_string(),
        steps: steps.iter().map(|s| s.to_string()).collect(),
    }
}

fn topic(question_id: &str, value: &str, template: SolutionTemplate) -> TopicRule {
    TopicRule {
        question_id: question_id.to_string(),
        value: value.to_string(),
        template,
    }
}

fn urgency_rules() -> Vec<PriorityRule> {
    [("critical", Priority::Critical), ("high", Priority::High)]
        .into_iter()
        .map(|(value, priority)| PriorityRule {
            question_id: "urgency".to_string(),
            value: value.to_string(),
            priority,
        })
        .collect()
}

fn urgency_question() -> Question {
    Question::new("urgency", QuestionKind::TextChoices, "How urgent is this issue?").with_options(
        vec![
            QuestionOption::new("low", "Low - Can wait a few days"),
            QuestionOption::new("medium", "Medium - Need resolution this week"),
            QuestionOption::new("high", "High - Need resolution today"),
            QuestionOption::new("critical", "Critical - Immediate attention required"),
        ],
    )
}

impl MockDataset {
    pub fn for_kind(kind: DatasetKind) -> Self {
        match kind {
            DatasetKind::Policy => Self::policy(),
            DatasetKind::Device => Self::device(),
        }
    }

    /// Company policy / service inquiries.
    pub fn policy() -> Self {
        let questions = vec![
            Question::new(
                "service-type",
                QuestionKind::TextChoices,
                "What type of service are you inquiring about?",
            )
            .with_options(vec![
                QuestionOption::new("technical-support", "Technical Support"),
                QuestionOption::new("billing-inquiry", "Billing Inquiry"),
                QuestionOption::new("account-management", "Account Management"),
                QuestionOption::new("product-information", "Product Information"),
            ]),
            Question::new(
                "issue-category",
                QuestionKind::ImageChoices,
                "Which category best describes your issue?",
            )
            .with_options(vec![
                QuestionOption::new("hardware", "Hardware").with_image("/hardware-icon.svg"),
                QuestionOption::new("software", "Software").with_image("/software-icon.svg"),
                QuestionOption::new("network", "Network").with_image("/network-icon.svg"),
                QuestionOption::new("performance", "Performance")
                    .with_image("/performance-icon.svg"),
            ]),
            urgency_question(),
            Question::new(
                "policy-inquiry",
                QuestionKind::TextChoices,
                "Are you asking about a specific company policy?",
            )
            .with_options(vec![
                QuestionOption::new("refund-policy", "Refund Policy"),
                QuestionOption::new("warranty-policy", "Warranty Policy"),
                QuestionOption::new("support-policy", "Support Policy"),
                QuestionOption::new("service-level", "Service Level Agreement"),
            ]),
            Question::new(
                "additional-info",
                QuestionKind::FreeText,
                "Please provide any additional details about your inquiry:",
            )
            .optional(),
        ];

        let topics = vec![
            topic(
                "policy-inquiry",
                "refund-policy",
                template(
                    "Refund Policy Information",
                    &[
                        "**30-Day Return Window** - Products can be returned within 30 days of purchase",
                        "**Original Packaging** - Item must be in original condition with all packaging",
                        "**Proof of Purchase** - Receipt or order confirmation required",
                        "**Processing Time** - Refunds processed within 5-7 business days",
                    ],
                ),
            ),
            topic(
                "policy-inquiry",
                "warranty-policy",
                template(
                    "Warranty Policy Information",
                    &[
                        "**Standard Warranty** - 1-year limited warranty on all products",
                        "**Extended Coverage** - Available for purchase up to 3 years",
                        "**Coverage Details** - Covers manufacturing defects and hardware failures",
                        "**Service Process** - Contact support for warranty claims and repairs",
                    ],
                ),
            ),
            topic(
                "policy-inquiry",
                "support-policy",
                template(
                    "Support Policy Information",
                    &[
                        "**24/7 Support** - Round-the-clock technical assistance available",
                        "**Response Times** - Critical issues: 2 hours, High: 4 hours, Medium: 24 hours",
                        "**Support Channels** - Phone, email, chat, and ticket system",
                        "**Escalation Process** - Complex issues escalated to senior technicians",
                    ],
                ),
            ),
            topic(
                "policy-inquiry",
                "service-level",
                template(
                    "Service Level Agreement (SLA)",
                    &[
                        "**Uptime Guarantee** - 99.9% service availability",
                        "**Response Commitments** - Based on issue severity and urgency",
                        "**Compensation** - Service credits for SLA violations",
                        "**Monitoring** - Real-time system monitoring and alerts",
                    ],
                ),
            ),
        ];

        Self {
            name: "policy".to_string(),
            questions,
            solutions: SolutionTable {
                solution_id: "solution-1".to_string(),
                description: "Based on your inquiry, here is the relevant information:".to_string(),
                fallback: template("Company Policy Information", &[]),
                topics,
                priorities: urgency_rules(),
                min_answers: 2,
            },
        }
    }

    /// Hardware troubleshooting.
    pub fn device() -> Self {
        let questions = vec![
            Question::new(
                "device",
                QuestionKind::ImageChoices,
                "Which device are you having trouble with?",
            )
            .with_options(vec![
                QuestionOption::new("laptop", "Laptop").with_image("/laptop-icon.svg"),
                QuestionOption::new("desktop", "Desktop").with_image("/desktop-icon.svg"),
                QuestionOption::new("phone", "Phone").with_image("/phone-icon.svg"),
                QuestionOption::new("tablet", "Tablet").with_image("/tablet-icon.svg"),
            ]),
            Question::new(
                "issue-type",
                QuestionKind::TextChoices,
                "What kind of problem are you seeing?",
            )
            .with_options(vec![
                QuestionOption::new("wont-turn-on", "It won't turn on"),
                QuestionOption::new("slow-performance", "It's running slowly"),
                QuestionOption::new("connectivity", "It can't connect to the internet"),
                QuestionOption::new("screen-damage", "The screen is damaged"),
            ]),
            urgency_question(),
            Question::new(
                "description",
                QuestionKind::FreeText,
                "Describe what happened right before the problem started:",
            )
            .optional(),
            Question::new(
                "budget",
                QuestionKind::Numeric,
                "What is your repair budget (USD)?",
            )
            .with_validation(QuestionValidation {
                min: Some(0.0),
                max: Some(5000.0),
                pattern: None,
            })
            .optional(),
        ];

        let topics = vec![
            topic(
                "issue-type",
                "wont-turn-on",
                template(
                    "Power Troubleshooting",
                    &[
                        "**Check the Charger** - Try a different outlet and confirm the charging light comes on",
                        "**Hard Reset** - Hold the power button for 30 seconds, then release",
                        "**Battery Drain** - Leave the device on the charger for at least 15 minutes",
                        "**Book a Repair** - If nothing responds, schedule a hardware diagnosis",
                    ],
                ),
            ),
            topic(
                "issue-type",
                "slow-performance",
                template(
                    "Performance Tune-Up",
                    &[
                        "**Restart** - Reboot to clear stuck background processes",
                        "**Free Up Storage** - Keep at least 15% of the disk free",
                        "**Update Software** - Install pending system and driver updates",
                        "**Check Startup Apps** - Disable programs you don't need at login",
                    ],
                ),
            ),
            topic(
                "issue-type",
                "connectivity",
                template(
                    "Connectivity Checklist",
                    &[
                        "**Toggle Wi-Fi** - Turn wireless off and on again",
                        "**Restart the Router** - Unplug it for 30 seconds",
                        "**Forget the Network** - Reconnect and re-enter the password",
                        "**Test Another Device** - Confirm whether the outage is local",
                    ],
                ),
            ),
            topic(
                "issue-type",
                "screen-damage",
                template(
                    "Screen Repair Options",
                    &[
                        "**Back Up Now** - Save your data before the damage spreads",
                        "**Check Coverage** - Accidental damage may be covered by your plan",
                        "**Repair Quote** - Request a quote for a screen replacement",
                        "**Temporary Fix** - Use an external display in the meantime",
                    ],
                ),
            ),
        ];

        Self {
            name: "device".to_string(),
            questions,
            solutions: SolutionTable {
                solution_id: "solution-1".to_string(),
                description: "Based on your answers, try these steps:".to_string(),
                fallback: template("General Troubleshooting", &[]),
                topics,
                priorities: urgency_rules(),
                min_answers: 2,
            },
        }
    }
}

/// Mock backend: canned questions, table-driven solutions, fixed delays.
#[derive(Debug, Clone)]
pub struct MockBackend {
    dataset: Arc<MockDataset>,
    latency: Latency,
}

impl MockBackend {
    pub fn new(dataset: MockDataset, latency: Latency) -> Self {
        Self {
            dataset: Arc::new(dataset),
            latency,
        }
    }

    pub fn dataset(&self) -> &MockDataset {
        &self.dataset
    }
}

#[async_trait]
impl WidgetBackend for MockBackend {
    async fn next_questions(&self, answers: &[Answer]) -> MockApiResponse {
        pause(self.latency.questions).await;
        let solution = self.dataset.solutions.resolve(answers);
        debug!(
            dataset = %self.dataset.name,
            answers = answers.len(),
            solution_ready = solution.is_some(),
            "mock questions served"
        );
        MockApiResponse {
            questions: self.dataset.questions.clone(),
            solution_ready: solution.is_some(),
            solution,
        }
    }

    async fn store_answer(&self, answer: &Answer) {
        pause(self.latency.answer).await;
        debug!(question_id = %answer.question_id, value = %answer.value, "mock answer saved");
    }

    async fn store_feedback(&self, feedback: &Feedback) {
        pause(self.latency.feedback).await;
        info!(?feedback, "feedback saved");
    }
}
