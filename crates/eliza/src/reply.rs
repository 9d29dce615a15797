//! Reply generation
//!
//! Inputs are normalized, checked against the goodbye set, then matched
//! against an ordered rule table. The first matching rule wins; its captured
//! fragment is reflected ("my" becomes "your" and so on) and substituted into
//! one of the rule's response templates.

use std::sync::LazyLock;

use regex_lite::Regex;

/// A reply produced by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// The sentence Eliza answers with.
    pub sentence: String,
    /// Whether the conversation should end after this reply.
    pub end_conversation: bool,
}

const GOODBYE_INPUTS: &[&str] = &["bye", "exit", "goodbye", "good bye", "quit", "farewell"];

const GOODBYE_RESPONSES: &[&str] = &[
    "Goodbye. It was nice talking to you.",
    "Thank you for talking to me.",
    "Thank you, that will be $150. Have a good day!",
    "Goodbye. This was really a nice talk.",
    "Goodbye. I'm looking forward to our next session.",
];

const DEFAULT_RESPONSES: &[&str] = &[
    "Please tell me more.",
    "Let's change focus a bit... Tell me about your family.",
    "Can you elaborate on that?",
    "I see.",
    "Very interesting.",
    "I see. And what does that tell you?",
    "How does that make you feel?",
    "How do you feel when you say that?",
];

/// `{0}` in a template is replaced with the reflected capture.
const RULE_TABLE: &[(&str, &[&str])] = &[
    (
        r"^i need (.*)$",
        &[
            "Why do you need {0}?",
            "Would it really help you to get {0}?",
            "Are you sure you need {0}?",
        ],
    ),
    (
        r"^why don'?t you ([^?]*)\??$",
        &[
            "Do you really think I don't {0}?",
            "Perhaps eventually I will {0}.",
            "Do you really want me to {0}?",
        ],
    ),
    (
        r"^why can'?t i ([^?]*)\??$",
        &[
            "Do you think you should be able to {0}?",
            "If you could {0}, what would you do?",
            "I don't know -- why can't you {0}?",
            "Have you really tried?",
        ],
    ),
    (
        r"^i can'?t (.*)$",
        &[
            "How do you know you can't {0}?",
            "Perhaps you could {0} if you tried.",
            "What would it take for you to {0}?",
        ],
    ),
    (
        r"^i am (.*)$",
        &[
            "Did you come to me because you are {0}?",
            "How long have you been {0}?",
            "How do you feel about being {0}?",
        ],
    ),
    (
        r"^i'?m (.*)$",
        &[
            "How does being {0} make you feel?",
            "Do you enjoy being {0}?",
            "Why do you tell me you're {0}?",
            "Why do you think you're {0}?",
        ],
    ),
    (
        r"^are you ([^?]*)\??$",
        &[
            "Why does it matter whether I am {0}?",
            "Would you prefer it if I were not {0}?",
            "Perhaps you believe I am {0}.",
            "I may be {0} -- what do you think?",
        ],
    ),
    (
        r"^what (.*)$",
        &[
            "Why do you ask?",
            "How would an answer to that help you?",
            "What do you think?",
        ],
    ),
    (
        r"^how (.*)$",
        &[
            "How do you suppose?",
            "Perhaps you can answer your own question.",
            "What is it you're really asking?",
        ],
    ),
    (
        r"^because (.*)$",
        &[
            "Is that the real reason?",
            "What other reasons come to mind?",
            "Does that reason apply to anything else?",
            "If {0}, what else must be true?",
        ],
    ),
    (
        r"^(.*)sorry(.*)$",
        &[
            "There are many times when no apology is needed.",
            "What feelings do you have when you apologize?",
        ],
    ),
    (
        r"^(?:hello|hi|hey)\b(.*)$",
        &[
            "Hello... I'm glad you could drop by today.",
            "Hi there... how are you today?",
            "Hello, how are you feeling today?",
        ],
    ),
    (
        r"^i think (.*)$",
        &[
            "Do you doubt {0}?",
            "Do you really think so?",
            "But you're not sure {0}?",
        ],
    ),
    (
        r"^(.*)\bfriends?\b(.*)$",
        &[
            "Tell me more about your friends.",
            "When you think of a friend, what comes to mind?",
            "Why don't you tell me about a childhood friend?",
        ],
    ),
    (
        r"^yes\b(.*)$",
        &["You seem quite sure.", "OK, but can you elaborate a bit?"],
    ),
    (
        r"^(.*)\bcomputers?\b(.*)$",
        &[
            "Are you really talking about me?",
            "Does it seem strange to talk to a computer?",
            "How do computers make you feel?",
            "Do you feel threatened by computers?",
        ],
    ),
    (
        r"^is it (.*)$",
        &[
            "Do you think it is {0}?",
            "Perhaps it's {0} -- what do you think?",
            "If it were {0}, what would you do?",
            "It could well be that {0}.",
        ],
    ),
    (
        r"^it is (.*)$",
        &[
            "You seem very certain.",
            "If I told you that it probably isn't {0}, what would you feel?",
        ],
    ),
    (
        r"^can you ([^?]*)\??$",
        &[
            "What makes you think I can't {0}?",
            "If I could {0}, then what?",
            "Why do you ask if I can {0}?",
        ],
    ),
    (
        r"^can i ([^?]*)\??$",
        &[
            "Perhaps you don't want to {0}.",
            "Do you want to be able to {0}?",
            "If you could {0}, would you?",
        ],
    ),
    (
        r"^you are (.*)$",
        &[
            "Why do you think I am {0}?",
            "Does it please you to think that I'm {0}?",
            "Perhaps you would like me to be {0}.",
            "Perhaps you're really talking about yourself?",
        ],
    ),
    (
        r"^you'?re (.*)$",
        &[
            "Why do you say I am {0}?",
            "Why do you think I am {0}?",
            "Are we talking about you, or me?",
        ],
    ),
    (
        r"^i don'?t (.*)$",
        &[
            "Don't you really {0}?",
            "Why don't you {0}?",
            "Do you want to {0}?",
        ],
    ),
    (
        r"^i feel (.*)$",
        &[
            "Good, tell me more about these feelings.",
            "Do you often feel {0}?",
            "When do you usually feel {0}?",
            "When you feel {0}, what do you do?",
        ],
    ),
    (
        r"^i have (.*)$",
        &[
            "Why do you tell me that you've {0}?",
            "Have you really {0}?",
            "Now that you have {0}, what will you do next?",
        ],
    ),
    (
        r"^i would (.*)$",
        &[
            "Could you explain why you would {0}?",
            "Why would you {0}?",
            "Who else knows that you would {0}?",
        ],
    ),
    (
        r"^is there (.*)$",
        &[
            "Do you think there is {0}?",
            "It's likely that there is {0}.",
            "Would you like there to be {0}?",
        ],
    ),
    (
        r"^my (.*)$",
        &[
            "I see, your {0}.",
            "Why do you say that your {0}?",
            "When your {0}, how do you feel?",
        ],
    ),
    (
        r"^you (.*)$",
        &[
            "We should be discussing you, not me.",
            "Why do you say that about me?",
            "Why do you care whether I {0}?",
        ],
    ),
    (
        r"^why (.*)$",
        &[
            "Why don't you tell me the reason why {0}?",
            "Why do you think {0}?",
        ],
    ),
    (
        r"^i want (.*)$",
        &[
            "What would it mean to you if you got {0}?",
            "Why do you want {0}?",
            "What would you do if you got {0}?",
            "If you got {0}, then what would you do?",
        ],
    ),
    (
        r"^(.*)\bmother\b(.*)$",
        &[
            "Tell me more about your mother.",
            "What was your relationship with your mother like?",
            "How do you feel about your mother?",
            "How does this relate to your feelings today?",
            "Good family relations are important.",
        ],
    ),
    (
        r"^(.*)\bfather\b(.*)$",
        &[
            "Tell me more about your father.",
            "How did your father make you feel?",
            "How do you feel about your father?",
            "Does your relationship with your father relate to your feelings today?",
            "Do you have trouble showing affection with your family?",
        ],
    ),
    (
        r"^(.*)\bchild\b(.*)$",
        &[
            "Did you have close friends as a child?",
            "What is your favorite childhood memory?",
            "Do you remember any dreams or nightmares from childhood?",
            "Did the other children sometimes tease you?",
            "How do you think your childhood experiences relate to your feelings today?",
        ],
    ),
    (
        r"^(.*)\?$",
        &[
            "Why do you ask that?",
            "Please consider whether you can answer your own question.",
            "Perhaps the answer lies within yourself?",
            "Why don't you tell me?",
        ],
    ),
];

const REFLECTIONS: &[(&str, &str)] = &[
    ("am", "are"),
    ("was", "were"),
    ("i", "you"),
    ("i'd", "you would"),
    ("i've", "you have"),
    ("i'll", "you will"),
    ("my", "your"),
    ("are", "am"),
    ("you've", "I have"),
    ("you'll", "I will"),
    ("your", "my"),
    ("yours", "mine"),
    ("you", "me"),
    ("me", "you"),
    ("myself", "yourself"),
    ("yourself", "myself"),
];

struct Rule {
    pattern: Regex,
    responses: &'static [&'static str],
}

static RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    RULE_TABLE
        .iter()
        .filter_map(|(pattern, responses)| {
            Regex::new(pattern)
                .ok()
                .map(|pattern| Rule { pattern, responses })
        })
        .collect()
});

/// Computes Eliza's reply to `input`.
///
/// This is a pure function: it never fails, always returns a non-empty
/// sentence, and returns the same reply for the same input.
pub fn reply(input: &str) -> Reply {
    let input = normalize(input);

    if GOODBYE_INPUTS.contains(&input.as_str()) {
        return Reply {
            sentence: pick(GOODBYE_RESPONSES, &input).to_string(),
            end_conversation: true,
        };
    }

    for rule in RULES.iter() {
        if let Some(captures) = rule.pattern.captures(&input) {
            let fragment = captures
                .iter()
                .skip(1)
                .flatten()
                .map(|m| m.as_str().trim())
                .find(|s| !s.is_empty())
                .map(reflect)
                .unwrap_or_default();
            let template = pick(rule.responses, &input);
            return Reply {
                sentence: template.replace("{0}", &fragment),
                end_conversation: false,
            };
        }
    }

    Reply {
        sentence: pick(DEFAULT_RESPONSES, &input).to_string(),
        end_conversation: false,
    }
}

fn normalize(input: &str) -> String {
    input
        .trim()
        .to_lowercase()
        .trim_end_matches(['.', '!'])
        .trim()
        .to_string()
}

fn reflect(fragment: &str) -> String {
    fragment
        .trim_end_matches(['?', '.', '!'])
        .split_whitespace()
        .map(|word| {
            REFLECTIONS
                .iter()
                .find(|(from, _)| *from == word)
                .map_or(word, |&(_, to)| to)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Picks one option as a deterministic function of `seed` (FNV-1a).
fn pick<'a>(options: &[&'a str], seed: &str) -> &'a str {
    let hash = seed.bytes().fold(0xcbf2_9ce4_8422_2325_u64, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0000_0100_0000_01b3)
    });
    // Every option table is non-empty.
    options[(hash % options.len() as u64) as usize]
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_all_rules_compile() {
        assert_eq!(RULES.len(), RULE_TABLE.len());
    }

    #[test]
    fn test_goodbye_ends_conversation() {
        for input in ["bye", "Goodbye!", "  QUIT. ", "good bye"] {
            let reply = reply(input);
            assert!(reply.end_conversation, "input {input:?} should end");
            assert!(GOODBYE_RESPONSES.contains(&reply.sentence.as_str()));
        }
    }

    #[test]
    fn test_goodbye_inside_sentence_does_not_end() {
        let reply = reply("I said goodbye to my friend");
        assert!(!reply.end_conversation);
    }

    #[test]
    fn test_reflection_in_reply() {
        let reply = reply("I need my coffee");
        assert!(!reply.end_conversation);
        assert!(
            reply.sentence.contains("your coffee"),
            "reply: {}",
            reply.sentence
        );
    }

    #[test]
    fn test_question_pattern_strips_question_mark() {
        let reply = reply("Are you a robot?");
        assert!(reply.sentence.contains("a robot"), "reply: {}", reply.sentence);
        assert!(!reply.sentence.contains("robot??"));
    }

    #[test]
    fn test_unmatched_input_uses_default() {
        let reply = reply("the weather was grey");
        assert!(DEFAULT_RESPONSES.contains(&reply.sentence.as_str()));
        assert!(!reply.end_conversation);
    }

    #[test]
    fn test_empty_input_still_replies() {
        let reply = reply("");
        assert!(!reply.sentence.is_empty());
        assert!(!reply.end_conversation);
    }

    #[test]
    fn test_reply_is_deterministic() {
        assert_eq!(reply("I am tired"), reply("I am tired"));
    }

    #[test]
    fn test_reflect_swaps_pronouns() {
        assert_eq!(reflect("i am with my friends"), "you are with your friends");
        assert_eq!(reflect("you told me"), "me told you");
    }

    #[test]
    fn test_every_template_placeholder_filled() {
        for input in [
            "I need a break",
            "why can't I sleep?",
            "I'm worried",
            "can you help me?",
            "my job is hard",
            "I want a cat",
        ] {
            let reply = reply(input);
            assert!(!reply.sentence.contains("{0}"), "reply: {}", reply.sentence);
        }
    }
}
