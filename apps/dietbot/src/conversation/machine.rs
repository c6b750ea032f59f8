//! Pure transition logic for the intake conversation.
//!
//! Nothing here touches the network or the store: the bot handlers feed an
//! [`Input`] and the current [`ConversationState`] in, then apply the returned
//! [`Transition`] and carry out its [`Effect`], if any.

use super::state::{Answers, ConversationState, Gender, Goal, Stage};

pub const HEIGHT_RANGE_CM: std::ops::RangeInclusive<u16> = 50..=250;
pub const WEIGHT_RANGE_KG: std::ops::RangeInclusive<u16> = 30..=300;

pub const CONFIRM_YES: &str = "Yes, that's right";
pub const CONFIRM_NO: &str = "No, let me change it";
pub const PAY_BUTTON: &str = "💳 Pay";

pub const WELCOME: &str =
    "👋 Hi! I will put together a personalized diet plan for you. First, choose your gender:";
pub const GENDER_RETRY: &str = "Please choose your gender using the buttons below.";
pub const HEIGHT_PROMPT: &str = "Thanks! Now enter your height in centimeters (for example, 175):";
pub const HEIGHT_RETRY: &str =
    "Please enter a valid height in centimeters between 50 and 250 (for example, 175):";
pub const WEIGHT_PROMPT: &str = "Thanks! Now enter your weight in kilograms (for example, 70):";
pub const WEIGHT_RETRY: &str =
    "Please enter a valid weight in kilograms between 30 and 300 (for example, 70):";
pub const GOAL_PROMPT: &str = "Thanks! What is your goal?";
pub const GOAL_RETRY: &str = "Please choose your goal using the buttons below.";
pub const CONFIRM_RETRY: &str = "Please choose one of the answers below.";
pub const RESTART: &str = "Let's start over. Choose your gender:";
pub const USE_START: &str = "Please send /start to begin.";
pub const HELP: &str = "I create personalized diet plans. Send /start to begin.";
pub const PAYMENT_CANCELLED: &str =
    "The payment was cancelled. You can try again at any time with /start.";
pub const AWAITING_PAYMENT: &str =
    "I am waiting for your payment to be confirmed. Use the payment button above, or /start to begin again.";
pub const PROCESSING: &str = "Your diet plan is being prepared, it will arrive shortly.";
pub const COMPLETE: &str = "Your diet plan has been sent. Send /start to create a new one.";
pub const STATE_LOST: &str = "Sorry, something went wrong. Please send /start to begin again.";
pub const CHECKOUT_FAILED: &str =
    "Sorry, we could not set up the payment. Please try again later.";
pub const PAY_PROMPT: &str = "Tap the button below to go to the payment page:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input<'a> {
    Start,
    Help,
    PaymentCancelled,
    Text(&'a str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Keyboard {
    None,
    Remove,
    Choices(Vec<Vec<String>>),
    PayLink { label: String, url: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub keyboard: Keyboard,
}

impl Reply {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: Keyboard::None,
        }
    }

    fn with_keyboard(text: impl Into<String>, keyboard: Keyboard) -> Self {
        Self {
            text: text.into(),
            keyboard,
        }
    }
}

/// Work the caller must perform outside the pure transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Persist the profile, open a checkout session and record the pending
    /// payment, then report back through [`checkout_started`] or
    /// [`checkout_failed`].
    BeginCheckout(Answers),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub state: ConversationState,
    pub replies: Vec<Reply>,
    pub effect: Option<Effect>,
}

impl Transition {
    fn stay(state: &ConversationState, reply: Reply) -> Self {
        Self {
            state: state.clone(),
            replies: vec![reply],
            effect: None,
        }
    }

    fn moved(state: ConversationState, reply: Reply) -> Self {
        Self {
            state,
            replies: vec![reply],
            effect: None,
        }
    }
}

pub fn gender_keyboard() -> Keyboard {
    Keyboard::Choices(vec![
        Gender::ALL.iter().map(|g| g.label().to_string()).collect(),
    ])
}

pub fn goal_keyboard() -> Keyboard {
    Keyboard::Choices(vec![
        vec![
            Goal::Reduce.label().to_string(),
            Goal::Maintain.label().to_string(),
        ],
        vec![Goal::Gain.label().to_string()],
    ])
}

pub fn confirm_keyboard() -> Keyboard {
    Keyboard::Choices(vec![vec![CONFIRM_YES.to_string(), CONFIRM_NO.to_string()]])
}

pub fn summary(answers: &Answers) -> String {
    format!(
        "Let's check your answers:\n\n\
         Gender: {}\n\
         Height: {} cm\n\
         Weight: {} kg\n\
         Goal: {}\n\n\
         Is everything correct?",
        answers.gender.label(),
        answers.height_cm,
        answers.weight_kg,
        answers.goal.label()
    )
}

fn parse_in_range(text: &str, range: &std::ops::RangeInclusive<u16>) -> Option<u16> {
    text.trim().parse::<u16>().ok().filter(|v| range.contains(v))
}

/// A fresh conversation positioned at the gender question.
fn restarted(state: &ConversationState) -> ConversationState {
    ConversationState {
        user_id: state.user_id,
        stage: Stage::Gender,
        pending_payment_ref: None,
    }
}

pub fn transition(state: &ConversationState, input: Input<'_>) -> Transition {
    let text = match input {
        Input::Start => {
            return Transition::moved(
                restarted(state),
                Reply::with_keyboard(WELCOME, gender_keyboard()),
            );
        }
        Input::Help => return Transition::stay(state, Reply::plain(HELP)),
        Input::PaymentCancelled => {
            return Transition::moved(
                ConversationState::new(state.user_id),
                Reply::with_keyboard(PAYMENT_CANCELLED, Keyboard::Remove),
            );
        }
        Input::Text(text) => text,
    };

    match &state.stage {
        Stage::Start => Transition::stay(state, Reply::plain(USE_START)),

        Stage::Gender => match Gender::from_label(text) {
            Some(gender) => Transition::moved(
                state.with_stage(Stage::Height { gender }),
                Reply::with_keyboard(HEIGHT_PROMPT, Keyboard::Remove),
            ),
            None => Transition::stay(state, Reply::with_keyboard(GENDER_RETRY, gender_keyboard())),
        },

        Stage::Height { gender } => match parse_in_range(text, &HEIGHT_RANGE_CM) {
            Some(height_cm) => Transition::moved(
                state.with_stage(Stage::Weight {
                    gender: *gender,
                    height_cm,
                }),
                Reply::plain(WEIGHT_PROMPT),
            ),
            None => Transition::stay(state, Reply::plain(HEIGHT_RETRY)),
        },

        Stage::Weight { gender, height_cm } => match parse_in_range(text, &WEIGHT_RANGE_KG) {
            Some(weight_kg) => Transition::moved(
                state.with_stage(Stage::Goal {
                    gender: *gender,
                    height_cm: *height_cm,
                    weight_kg,
                }),
                Reply::with_keyboard(GOAL_PROMPT, goal_keyboard()),
            ),
            None => Transition::stay(state, Reply::plain(WEIGHT_RETRY)),
        },

        Stage::Goal {
            gender,
            height_cm,
            weight_kg,
        } => match Goal::from_label(text) {
            Some(goal) => {
                let answers = Answers {
                    gender: *gender,
                    height_cm: *height_cm,
                    weight_kg: *weight_kg,
                    goal,
                };
                Transition::moved(
                    state.with_stage(Stage::Confirm { answers }),
                    Reply::with_keyboard(summary(&answers), confirm_keyboard()),
                )
            }
            None => Transition::stay(state, Reply::with_keyboard(GOAL_RETRY, goal_keyboard())),
        },

        Stage::Confirm { answers } => match text {
            CONFIRM_NO => {
                Transition::moved(restarted(state), Reply::with_keyboard(RESTART, gender_keyboard()))
            }
            CONFIRM_YES => Transition {
                state: state.clone(),
                replies: Vec::new(),
                effect: Some(Effect::BeginCheckout(*answers)),
            },
            _ => Transition::stay(state, Reply::with_keyboard(CONFIRM_RETRY, confirm_keyboard())),
        },

        Stage::Payment { .. } => Transition::stay(state, Reply::plain(AWAITING_PAYMENT)),
        Stage::Processing => Transition::stay(state, Reply::plain(PROCESSING)),
        Stage::Complete => Transition::stay(state, Reply::plain(COMPLETE)),

        Stage::Unknown => Transition::moved(
            ConversationState::new(state.user_id),
            Reply::with_keyboard(STATE_LOST, Keyboard::Remove),
        ),
    }
}

/// Applied after [`Effect::BeginCheckout`] succeeded.
pub fn checkout_started(
    state: &ConversationState,
    answers: Answers,
    session_ref: String,
    checkout_url: String,
    price_display: &str,
) -> Transition {
    Transition {
        state: ConversationState {
            user_id: state.user_id,
            stage: Stage::Payment { answers },
            pending_payment_ref: Some(session_ref),
        },
        replies: vec![
            Reply::with_keyboard(
                format!(
                    "Thanks! Your answers are saved. The personalized diet plan costs {}.",
                    price_display
                ),
                Keyboard::Remove,
            ),
            Reply::with_keyboard(
                PAY_PROMPT,
                Keyboard::PayLink {
                    label: PAY_BUTTON.to_string(),
                    url: checkout_url,
                },
            ),
        ],
        effect: None,
    }
}

/// Applied after [`Effect::BeginCheckout`] failed; the user may press "Yes" again.
pub fn checkout_failed(state: &ConversationState) -> Transition {
    Transition::stay(state, Reply::with_keyboard(CHECKOUT_FAILED, confirm_keyboard()))
}
