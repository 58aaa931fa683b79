//! Keyword auto-replies for inbound platform messages.
//!
//! Rules are an explicitly ordered list checked top to bottom; the
//! first pattern contained in the (lowercased) message wins. Iteration
//! order matters, which is why this is a `Vec` and not a map.

/// Ordered first-match-wins reply rules plus a fallback.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<(String, String)>,
    fallback: String,
}

impl RuleSet {
    /// Patterns are matched case-insensitively as substrings, in the
    /// order given.
    pub fn new(rules: Vec<(String, String)>, fallback: impl Into<String>) -> Self {
        let rules = rules
            .into_iter()
            .map(|(pattern, reply)| (pattern.to_lowercase(), reply))
            .collect();
        Self {
            rules,
            fallback: fallback.into(),
        }
    }

    /// The built-in support-desk rules used when auto-reply is enabled
    /// without custom configuration.
    pub fn builtin() -> Self {
        Self::new(
            vec![
                (
                    "hello".into(),
                    "Hi there! A human will pick this up shortly.".into(),
                ),
                (
                    "help".into(),
                    "You can ask anything here and the team will answer as soon as possible.".into(),
                ),
                (
                    "hours".into(),
                    "The team is usually around on weekdays, 9:00-18:00.".into(),
                ),
            ],
            "Thanks! Your message has been passed along.",
        )
    }

    /// The reply for `text`: the first matching rule, or the fallback.
    pub fn reply_for(&self, text: &str) -> String {
        let haystack = text.to_lowercase();
        for (pattern, reply) in &self.rules {
            if haystack.contains(pattern) {
                return reply.clone();
            }
        }
        self.fallback.clone()
    }
}
