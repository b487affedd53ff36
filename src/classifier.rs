//! Turns free text into a [`Label`].
//!
//! [`Classifier::classify`] never fails: short input, unparsable answers and remote errors
//! all end in [`Label::Neutral`] once the attempt cap is used up.

use std::time::Duration;

use tracing::{debug, warn};

use crate::config::ClassifierConfig;
use crate::prompt::{self, SYSTEM_PROMPT};
use crate::rate_limit::RateLimiter;
use crate::record::Label;
use crate::scorer::Scorer;

pub struct Classifier<S, R> {
    scorer: S,
    limiter: R,
    max_attempts: u32,
    parse_retry_delay: Duration,
    error_retry_delay: Duration,
    min_text_chars: usize,
}

impl<S: Scorer, R: RateLimiter> Classifier<S, R> {
    pub fn new(scorer: S, limiter: R, config: &ClassifierConfig) -> Self {
        Self {
            scorer,
            limiter,
            max_attempts: config.max_attempts.max(1),
            parse_retry_delay: config.parse_retry_delay(),
            error_retry_delay: config.error_retry_delay(),
            min_text_chars: config.min_text_chars,
        }
    }

    pub fn scorer(&self) -> &S {
        &self.scorer
    }

    /// Labels `text`; `None` stands for a missing cell.
    pub async fn classify(&self, text: Option<&str>) -> Label {
        let Some(text) = text else {
            return Label::Neutral;
        };
        if text.trim().chars().count() < self.min_text_chars {
            debug!("text too short, skipping remote call");
            return Label::Neutral;
        }

        let user = prompt::render(text);
        let max = self.max_attempts;

        for attempt in 1..=max {
            self.limiter.acquire().await;

            let delay = match self.scorer.score(SYSTEM_PROMPT, &user).await {
                Ok(answer) => match parse_label(&answer) {
                    Some(label) => return label,
                    None => {
                        warn!(attempt, max, %answer, "unparsable answer");
                        self.parse_retry_delay
                    }
                },
                Err(e) => {
                    warn!(attempt, max, error = %e, "classification call failed");
                    self.error_retry_delay
                }
            };

            if attempt < max {
                tokio::time::sleep(delay).await;
            }
        }

        warn!(max, "out of attempts, labeling neutral");
        Label::Neutral
    }
}

/// Reads a label out of a raw answer by substring.
///
/// `1` wins unless `-1` is present, then `-1`, then `0`. Anything else is `None`.
/// Note that `"10"` and `"01"` both read as [`Label::Buy`].
pub fn parse_label(answer: &str) -> Option<Label> {
    if answer.contains('1') && !answer.contains("-1") {
        Some(Label::Buy)
    } else if answer.contains("-1") {
        Some(Label::Sell)
    } else if answer.contains('0') {
        Some(Label::Neutral)
    } else {
        None
    }
}
