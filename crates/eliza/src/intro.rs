//! Introduction sequence

/// Returns the ordered sentences Eliza uses to introduce herself to `name`.
///
/// The sequence is fixed: the same name always produces the same sentences
/// in the same order.
pub fn introductions(name: &str) -> Vec<String> {
    vec![
        format!("Hi {name}. I'm Eliza."),
        format!("Before we begin, {name}, let me tell you something about myself."),
        "I was created by Joseph Weizenbaum at MIT in the 1960s.".to_string(),
        "How are you feeling today?".to_string(),
    ]
}
