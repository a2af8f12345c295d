//! Locally generated replies.
//!
//! Used whenever the hosted agent is unconfigured, unreachable, or returns
//! nothing usable. Rules are checked in order and the first match wins, so a
//! message that mentions both a crisis keyword and "help" always gets the
//! crisis reply.

/// Notice returned when a client exceeds the rate limit.
pub const RATE_LIMIT_NOTICE: &str = "You're sending messages too fast. Please wait a moment.";

/// Prompt returned for an empty or whitespace-only message.
pub const EMPTY_INPUT_PROMPT: &str = "Say something — I'm listening.";

/// Category a fallback reply was chosen for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackCategory {
    /// Self-harm or crisis language
    Crisis,
    /// General distress
    Distress,
    /// Explicit request for help
    Help,
    /// Questions about AI or holograms
    AiTopic,
    /// Nothing matched
    Default,
}

/// One entry of the rule table.
#[derive(Debug)]
pub struct FallbackRule {
    pub category: FallbackCategory,
    /// Lowercase substrings; any match selects the rule
    pub keywords: &'static [&'static str],
    pub reply: &'static str,
}

impl FallbackRule {
    fn matches(&self, lowered: &str) -> bool {
        self.keywords.iter().any(|k| lowered.contains(k))
    }
}

/// Rules in priority order.
pub const RULES: &[FallbackRule] = &[
    FallbackRule {
        category: FallbackCategory::Crisis,
        keywords: &["hurt", "suicide", "die", "kill myself", "self-harm"],
        reply: "I'm really sorry you're feeling this way. I can't help with instructions for harm. \
                Please contact your local emergency services or a crisis hotline right now. \
                If you want, tell me where you are and I can help find local resources.",
    },
    FallbackRule {
        category: FallbackCategory::Distress,
        keywords: &["lost", "broken", "fail", "sad", "depressed"],
        reply: "I hear that pain. What's one small, kind thing you could try right now to steady yourself?",
    },
    FallbackRule {
        category: FallbackCategory::Help,
        keywords: &["help"],
        reply: "I'm here to help. Tell me one thing that feels heavy and we'll take a tiny step together.",
    },
    FallbackRule {
        category: FallbackCategory::AiTopic,
        keywords: &["ai", "hologram"],
        reply: "AI is a tool to amplify your story, not replace it. What would you want it to help you with?",
    },
];

/// Reply used when no rule matches.
pub const DEFAULT_REPLY: &str = "I see you. What's alive in you today? 🛩️";

fn matching_rule(message: &str) -> Option<&'static FallbackRule> {
    let lowered = message.to_lowercase();
    RULES.iter().find(|rule| rule.matches(&lowered))
}

/// Classify a message into a fallback category.
pub fn classify(message: &str) -> FallbackCategory {
    matching_rule(message).map_or(FallbackCategory::Default, |rule| rule.category)
}

/// Pick the fallback reply for a message.
pub fn fallback_reply(message: &str) -> &'static str {
    matching_rule(message).map_or(DEFAULT_REPLY, |rule| rule.reply)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply_for(category: FallbackCategory) -> &'static str {
        RULES
            .iter()
            .find(|r| r.category == category)
            .map(|r| r.reply)
            .unwrap()
    }

    #[test]
    fn test_crisis_beats_help() {
        let msg = "Please help, I want to kill myself";
        assert_eq!(classify(msg), FallbackCategory::Crisis);
        assert_eq!(fallback_reply(msg), reply_for(FallbackCategory::Crisis));
        assert_ne!(fallback_reply(msg), reply_for(FallbackCategory::Help));
    }

    #[test]
    fn test_crisis_reply_points_to_emergency_resources() {
        let reply = fallback_reply("thinking about self-harm");
        assert!(reply.contains("emergency services"));
        assert!(reply.contains("can't help with instructions for harm"));
    }

    #[test]
    fn test_distress() {
        assert_eq!(classify("I feel so lost"), FallbackCategory::Distress);
        assert_eq!(
            fallback_reply("I feel so lost"),
            "I hear that pain. What's one small, kind thing you could try right now to steady yourself?"
        );
    }

    #[test]
    fn test_distress_beats_help() {
        assert_eq!(classify("help, everything is broken"), FallbackCategory::Distress);
    }

    #[test]
    fn test_help() {
        assert_eq!(classify("Can you HELP me plan my week?"), FallbackCategory::Help);
    }

    #[test]
    fn test_ai_topic_is_substring_match() {
        assert_eq!(classify("Tell me about the hologram"), FallbackCategory::AiTopic);
        // Substring matching: "said" contains "ai"
        assert_eq!(classify("she said hello"), FallbackCategory::AiTopic);
    }

    #[test]
    fn test_default() {
        assert_eq!(classify("good morning"), FallbackCategory::Default);
        assert_eq!(fallback_reply("good morning"), DEFAULT_REPLY);
        assert_eq!(fallback_reply(""), DEFAULT_REPLY);
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(classify("I AM SO SAD"), FallbackCategory::Distress);
        assert_eq!(classify("SUICIDE"), FallbackCategory::Crisis);
    }
}
