//! Roleplay scenarios and the tutor instruction built from them

use serde::{Deserialize, Serialize};

/// A named roleplay context, fixed for a session until an explicit reset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Scenario {
    #[default]
    GeneralConversation,
    JobInterview,
    OrderingFood,
    TechMeeting,
}

impl Scenario {
    pub const ALL: [Scenario; 4] = [
        Scenario::GeneralConversation,
        Scenario::JobInterview,
        Scenario::OrderingFood,
        Scenario::TechMeeting,
    ];

    /// Human readable name, also used inside the instruction
    pub fn label(&self) -> &'static str {
        match self {
            Scenario::GeneralConversation => "General Conversation",
            Scenario::JobInterview => "Job Interview",
            Scenario::OrderingFood => "Ordering Food",
            Scenario::TechMeeting => "Tech Meeting",
        }
    }

    /// Kebab-case identifier accepted on the command line
    pub fn slug(&self) -> &'static str {
        match self {
            Scenario::GeneralConversation => "general-conversation",
            Scenario::JobInterview => "job-interview",
            Scenario::OrderingFood => "ordering-food",
            Scenario::TechMeeting => "tech-meeting",
        }
    }

    /// The character the model plays
    pub fn character(&self) -> &'static str {
        match self {
            Scenario::GeneralConversation => "a friendly native speaker chatting about everyday life",
            Scenario::JobInterview => "a hiring manager interviewing the student for a job",
            Scenario::OrderingFood => "a waiter taking the student's order at a restaurant",
            Scenario::TechMeeting => "a colleague in a software team meeting",
        }
    }

    /// Build the system instruction for this scenario
    pub fn system_instruction(&self) -> String {
        format!(
            r#"You are a professional native English tutor and roleplay partner in the scenario: '{label}'.
In this roleplay you are {character}.

YOUR GOAL:
Help the student learn English through the 'Acquire, Practice, Adjust' method.

THE FLOW:
1. If the student makes a mistake (grammar, vocabulary or phrasing), give a friendly 'Adjust' correction in "feedback". If the sentence is perfect, give a short praise such as "Great sentence!".
2. Offer up to three corrected or more natural ways to say what the student meant in "suggestions".
3. Reply in character as the 'Practice' step in "response" to keep the conversation going.
4. If the student sent audio, rate their pronunciation from 0 to 100 in "pronunciationScore". For typed messages use 0.

RESPONSE FORMAT:
Respond with a single JSON object and nothing else:
{{
    "feedback": "correction or praise",
    "suggestions": ["better phrasing"],
    "pronunciationScore": 0,
    "response": "your in-character reply"
}}

Keep the roleplay engaging and contextually appropriate."#,
            label = self.label(),
            character = self.character(),
        )
    }
}

impl std::fmt::Display for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl std::str::FromStr for Scenario {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let wanted: String = s
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();

        Scenario::ALL
            .iter()
            .copied()
            .find(|sc| {
                let slug: String = sc.slug().chars().filter(|c| *c != '-').collect();
                slug == wanted || (!wanted.is_empty() && slug.starts_with(&wanted))
            })
            .ok_or_else(|| {
                let names: Vec<&str> = Scenario::ALL.iter().map(|sc| sc.slug()).collect();
                anyhow::anyhow!("Unknown scenario '{}'. Available: {}", s, names.join(", "))
            })
    }
}

/// Text part that travels with an audio payload
pub const AUDIO_INSTRUCTION: &str = "The student sent this voice message. Listen to it, work out what they said, \
evaluate their pronunciation and answer using the JSON format.";
