use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub const ALL: [Gender; 2] = [Gender::Male, Gender::Female];

    /// Button text shown on the reply keyboard.
    pub fn label(&self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }

    pub fn from_label(text: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|g| g.label() == text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Goal {
    Reduce,
    Maintain,
    Gain,
}

impl Goal {
    pub const ALL: [Goal; 3] = [Goal::Reduce, Goal::Maintain, Goal::Gain];

    pub fn label(&self) -> &'static str {
        match self {
            Goal::Reduce => "Lose weight",
            Goal::Maintain => "Maintain weight",
            Goal::Gain => "Gain weight",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Goal::Reduce => "reduce",
            Goal::Maintain => "maintain",
            Goal::Gain => "gain",
        }
    }

    pub fn from_label(text: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|g| g.label() == text)
    }
}

/// All four answers, available once the user reaches the confirmation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answers {
    pub gender: Gender,
    pub height_cm: u16,
    pub weight_kg: u16,
    pub goal: Goal,
}

/// Where the user is in the intake flow. Each variant holds only the answers
/// collected before it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum Stage {
    Start,
    Gender,
    Height {
        gender: Gender,
    },
    Weight {
        gender: Gender,
        height_cm: u16,
    },
    Goal {
        gender: Gender,
        height_cm: u16,
        weight_kg: u16,
    },
    Confirm {
        answers: Answers,
    },
    Payment {
        answers: Answers,
    },
    Processing,
    Complete,
    /// A stored stage this build does not recognise.
    #[serde(other)]
    Unknown,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Start => "start",
            Stage::Gender => "gender",
            Stage::Height { .. } => "height",
            Stage::Weight { .. } => "weight",
            Stage::Goal { .. } => "goal",
            Stage::Confirm { .. } => "confirm",
            Stage::Payment { .. } => "payment",
            Stage::Processing => "processing",
            Stage::Complete => "complete",
            Stage::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationState {
    pub user_id: i64,
    pub stage: Stage,
    /// Checkout session created for this conversation, if any.
    pub pending_payment_ref: Option<String>,
}

impl ConversationState {
    pub fn new(user_id: i64) -> Self {
        Self {
            user_id,
            stage: Stage::Start,
            pending_payment_ref: None,
        }
    }

    pub fn with_stage(&self, stage: Stage) -> Self {
        Self {
            stage,
            ..self.clone()
        }
    }
}
