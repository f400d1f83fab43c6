use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of an experiment. `Completed` may still move to
/// `WinnerSelected`; `WinnerSelected` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperimentStatus {
    Draft,
    Running,
    Paused,
    Completed,
    WinnerSelected,
}

impl ExperimentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExperimentStatus::Draft => "draft",
            ExperimentStatus::Running => "running",
            ExperimentStatus::Paused => "paused",
            ExperimentStatus::Completed => "completed",
            ExperimentStatus::WinnerSelected => "winner_selected",
        }
    }
}

impl std::fmt::Display for ExperimentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The outcome rate an experiment's winner is judged by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WinnerCriteria {
    OpenRate,
    ClickRate,
    ReplyRate,
    ConversionRate,
}

/// One treatment in an experiment with its own content and traffic share.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variant {
    pub id: Uuid,
    pub label: String,
    /// Opaque treatment payload (subject line, body, template id).
    #[serde(default)]
    pub content: serde_json::Value,
    /// Integer share of traffic in [0, 100]. The allocator keeps the sum
    /// across variants at exactly 100.
    pub traffic_percentage: u8,
    #[serde(default)]
    pub is_control: bool,
}

impl Variant {
    pub fn new(label: impl Into<String>, traffic_percentage: u8) -> Self {
        Self {
            id: Uuid::new_v4(),
            label: label.into(),
            content: serde_json::json!({}),
            traffic_percentage,
            is_control: false,
        }
    }

    pub fn control(label: impl Into<String>, traffic_percentage: u8) -> Self {
        let mut variant = Self::new(label, traffic_percentage);
        variant.is_control = true;
        variant
    }
}

/// An A/B/n experiment definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentDefinition {
    pub id: Uuid,
    pub name: String,
    /// Channel/content dimension under test, e.g. `email_subject`.
    pub test_type: String,
    pub status: ExperimentStatus,
    pub winner_criteria: WinnerCriteria,
    #[serde(default)]
    pub auto_select_winner: bool,
    pub min_sample_size: u64,
    pub test_duration_hours: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner_variant_id: Option<Uuid>,
    pub variants: Vec<Variant>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ExperimentDefinition {
    pub fn new(
        name: impl Into<String>,
        test_type: impl Into<String>,
        winner_criteria: WinnerCriteria,
        variants: Vec<Variant>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            test_type: test_type.into(),
            status: ExperimentStatus::Draft,
            winner_criteria,
            auto_select_winner: false,
            min_sample_size: 100,
            test_duration_hours: 72,
            winner_variant_id: None,
            variants,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn variant(&self, id: &Uuid) -> Option<&Variant> {
        self.variants.iter().find(|v| v.id == *id)
    }
}

/// Per-variant outcome counters owned by the recording collaborator.
/// Counters are monotonically non-decreasing; rates derive from them and
/// are 0 while nothing was sent.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct VariantMetrics {
    pub sent: u64,
    pub opens: u64,
    pub clicks: u64,
    pub replies: u64,
    pub conversions: u64,
}

impl VariantMetrics {
    pub fn open_rate(&self) -> f64 {
        self.rate(self.opens)
    }

    pub fn click_rate(&self) -> f64 {
        self.rate(self.clicks)
    }

    pub fn reply_rate(&self) -> f64 {
        self.rate(self.replies)
    }

    pub fn conversion_rate(&self) -> f64 {
        self.rate(self.conversions)
    }

    pub fn rate_for(&self, criteria: WinnerCriteria) -> f64 {
        match criteria {
            WinnerCriteria::OpenRate => self.open_rate(),
            WinnerCriteria::ClickRate => self.click_rate(),
            WinnerCriteria::ReplyRate => self.reply_rate(),
            WinnerCriteria::ConversionRate => self.conversion_rate(),
        }
    }

    fn rate(&self, numerator: u64) -> f64 {
        if self.sent == 0 {
            0.0
        } else {
            numerator as f64 / self.sent as f64
        }
    }
}

/// Result of a winner evaluation. Advisory unless the experiment has
/// `auto_select_winner` set, in which case the engine applies it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WinnerDecision {
    pub can_decide: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner_id: Option<Uuid>,
    pub reason: String,
}
