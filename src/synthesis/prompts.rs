//! Prompt templates for the abstract synthesizer
//!
//! The JSON contracts matter more than the wording: each prompt pins the
//! exact shape the parser expects.

/// Summarize a character's attributes from their graph evidence.
///
/// Expects a JSON object `{attribute: confidence}`.
pub const CHARACTER_ATTRIBUTES: &str = r#"
You are given a character's name and the list of their observed behaviors in
chronological order.

Summarize the character's attributes:
- personality (e.g. confident, nervous)
- role or profession (e.g. host, newcomer)
- interests or background, when inferable
- distinctive behaviors or traits

Do not restate visual facts; describe who the character is. Give each
attribute a confidence score between 0 and 100 and leave out anything below
50.

Output a JSON object mapping attribute to confidence score.
Example: {"student": 90, "enthusiastic": 80, "likes to read": 70}
"#;

/// Extract abstract relationships between two characters.
///
/// Expects a JSON array of `[character1, relationship, character2, confidence]`.
pub const CHARACTER_RELATIONSHIPS: &str = r#"
You are given a list of interactions between two characters in chronological
order.

Extract the abstract relationships between them:
- roles (friends, colleagues, host-guest, teacher-student, ...)
- attitudes and emotions (respect, dislike, friendliness, ...)
- power dynamics (who leads, equal footing, ...)
- cooperation, conflict, exclusion, or competition

Rules:
- Store only abstract relationships, never concrete actions
  (not "<Alice> plays games with <Bob>").
- Do not produce symmetric duplicates.
- Give each relationship a confidence score between 0 and 100 and leave out
  anything below 50. A short list is acceptable.

Output a JSON array of arrays, each
[character1, relationship, character2, confidence].
Example: [["<Alice>", "is friend with", "<Bob>", 90]]
"#;

/// Summarize a closed conversation and mine it for identity, attributes,
/// and relationships.
///
/// Expects a JSON object with keys `name_equivalences`, `summary`,
/// `character_attributes`, `characters_relationships`.
pub const CONVERSATION_SUMMARY: &str = r#"
You are given a conversation between several characters.

Tasks:

1. name_equivalences: if the dialogue reveals the real name of a placeholder
   speaker (e.g. "<character_1>" turns out to be Alice), list the pair.
   Output: JSON array of [placeholder_id, real_name] pairs; empty if none.

2. summary: 2-4 concise sentences covering the key topics, decisions, and
   outcomes. Focus on what was discussed and decided.
   Output: JSON string.

3. character_attributes: attributes revealed through dialogue and
   interaction style: personality traits, role or profession, interests,
   background. Do not include physical appearance, concrete actions, or
   temporary emotional states.
   Output: JSON array of [character, attribute, confidence] with
   confidence 0-100; omit entries below 50. Use angle brackets for
   character names.

4. characters_relationships: abstract relationships grounded in the
   dialogue: roles, attitudes, power dynamics, cooperation or conflict. No
   concrete actions, no dialogue topics, no symmetric duplicates.
   Output: JSON array of [character1, relationship, character2, confidence]
   with confidence 0-100; omit entries below 50.

Return one JSON object with exactly the four keys:
"name_equivalences", "summary", "character_attributes",
"characters_relationships".

Now summarize the following conversation:
"#;
