//! Keyword-based meditation suggestions shown next to a reply.

use std::sync::OnceLock;

use regex::Regex;

/// Checked in order; the first entry with a matching keyword wins.
const SUGGESTIONS: &[(&[&str], &str)] = &[
    (&["stress", "stressed", "stressful", "exam", "exams", "overwhelmed"], "Box Breathing"),
    (&["sleep", "insomnia", "tired", "awake"], "Body Scan for Sleep"),
    (&["anxious", "anxiety", "panic", "worried", "nervous"], "5-4-3-2-1 Grounding"),
    (&["sad", "lonely", "alone", "down"], "Loving-Kindness Meditation"),
    (&["angry", "anger", "frustrated", "furious"], "Cooling Breath"),
];

fn matchers() -> &'static [(Regex, &'static str)] {
    static MATCHERS: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    MATCHERS.get_or_init(|| {
        SUGGESTIONS
            .iter()
            .filter_map(|(keywords, meditation)| {
                let pattern = format!(r"(?i)\b(?:{})\b", keywords.join("|"));
                match Regex::new(&pattern) {
                    Ok(regex) => Some((regex, *meditation)),
                    Err(e) => {
                        tracing::error!("Invalid meditation keyword pattern {}: {}", pattern, e);
                        None
                    }
                }
            })
            .collect()
    })
}

pub fn suggest_meditation(text: &str) -> Option<&'static str> {
    matchers()
        .iter()
        .find(|(regex, _)| regex.is_match(text))
        .map(|(_, meditation)| *meditation)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_case_insensitively() {
        assert_eq!(
            suggest_meditation("I feel so STRESSED about exams"),
            Some("Box Breathing")
        );
        assert_eq!(suggest_meditation("Insomnia again"), Some("Body Scan for Sleep"));
    }

    #[test]
    fn requires_whole_words() {
        assert_eq!(suggest_meditation("my sadistic boss"), None);
        assert_eq!(suggest_meditation("examine the results"), None);
    }

    #[test]
    fn first_entry_wins() {
        assert_eq!(
            suggest_meditation("I'm anxious and can't sleep before the exam"),
            Some("Box Breathing")
        );
    }

    #[test]
    fn no_keyword_no_suggestion() {
        assert_eq!(suggest_meditation("What a lovely day"), None);
        assert_eq!(suggest_meditation(""), None);
    }
}
