use std::fmt;

use serde::{Serialize, Serializer};

use crate::models::{Answers, QuestionId};

/// A named concern derived from one questionnaire answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Issue {
    LowEnergy,
    SleepDeprivation,
    HighStress,
    PhysicalInactivity,
    PhysicalPain,
    PoorNutrition,
    CopingDifficulties,
    ConcentrationIssues,
    SocialIsolation,
}

impl Issue {
    pub const ALL: [Issue; 9] = [
        Issue::LowEnergy,
        Issue::SleepDeprivation,
        Issue::HighStress,
        Issue::PhysicalInactivity,
        Issue::PhysicalPain,
        Issue::PoorNutrition,
        Issue::CopingDifficulties,
        Issue::ConcentrationIssues,
        Issue::SocialIsolation,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Issue::LowEnergy => "Low Energy",
            Issue::SleepDeprivation => "Sleep Deprivation",
            Issue::HighStress => "High Stress/Anxiety",
            Issue::PhysicalInactivity => "Physical Inactivity",
            Issue::PhysicalPain => "Physical Pain",
            Issue::PoorNutrition => "Poor Nutrition",
            Issue::CopingDifficulties => "Coping Difficulties",
            Issue::ConcentrationIssues => "Concentration Issues",
            Issue::SocialIsolation => "Social Isolation",
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for Issue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// One classification rule: answers in `triggers` raise `issue`.
#[derive(Debug, Clone, Copy)]
pub struct IssueRule {
    pub question: QuestionId,
    pub triggers: &'static [&'static str],
    pub issue: Issue,
}

/// Rules in question order. Question 10 has no rule.
pub const RULES: [IssueRule; 9] = [
    IssueRule {
        question: 1,
        triggers: &["low", "very_low"],
        issue: Issue::LowEnergy,
    },
    IssueRule {
        question: 2,
        triggers: &["5-6", "less_5"],
        issue: Issue::SleepDeprivation,
    },
    IssueRule {
        question: 3,
        triggers: &["often", "daily"],
        issue: Issue::HighStress,
    },
    IssueRule {
        question: 4,
        triggers: &["moderate", "inactive"],
        issue: Issue::PhysicalInactivity,
    },
    IssueRule {
        question: 5,
        triggers: &["moderate", "severe"],
        issue: Issue::PhysicalPain,
    },
    IssueRule {
        question: 6,
        triggers: &["fair", "poor"],
        issue: Issue::PoorNutrition,
    },
    IssueRule {
        question: 7,
        triggers: &["sometimes", "often"],
        issue: Issue::CopingDifficulties,
    },
    IssueRule {
        question: 8,
        triggers: &["often"],
        issue: Issue::ConcentrationIssues,
    },
    IssueRule {
        question: 9,
        triggers: &["fair", "poor"],
        issue: Issue::SocialIsolation,
    },
];

/// Fixed questionnaire layout: label and allowed options per question.
#[derive(Debug, Clone, Copy)]
pub struct QuestionSpec {
    pub id: QuestionId,
    pub label: &'static str,
    pub options: [&'static str; 4],
}

pub const QUESTIONS: [QuestionSpec; 10] = [
    QuestionSpec {
        id: 1,
        label: "Energy Levels",
        options: ["high", "moderate", "low", "very_low"],
    },
    QuestionSpec {
        id: 2,
        label: "Sleep",
        options: ["9+", "7-8", "5-6", "less_5"],
    },
    QuestionSpec {
        id: 3,
        label: "Stress",
        options: ["rarely", "sometimes", "often", "daily"],
    },
    QuestionSpec {
        id: 4,
        label: "Activity",
        options: ["very_active", "active", "moderate", "inactive"],
    },
    QuestionSpec {
        id: 5,
        label: "Pain",
        options: ["none", "mild", "moderate", "severe"],
    },
    QuestionSpec {
        id: 6,
        label: "Nutrition",
        options: ["excellent", "good", "fair", "poor"],
    },
    QuestionSpec {
        id: 7,
        label: "Coping",
        options: ["never", "rarely", "sometimes", "often"],
    },
    QuestionSpec {
        id: 8,
        label: "Concentration",
        options: ["never", "rarely", "sometimes", "often"],
    },
    QuestionSpec {
        id: 9,
        label: "Social",
        options: ["excellent", "good", "fair", "poor"],
    },
    QuestionSpec {
        id: 10,
        label: "Life Changes",
        options: ["none", "minor", "moderate", "major"],
    },
];

/// Issues raised by an answer set, in question order.
///
/// Missing or unrecognised answers raise nothing.
pub fn classify(answers: &Answers) -> Vec<Issue> {
    RULES
        .iter()
        .filter(|rule| {
            answers
                .get(&rule.question)
                .is_some_and(|answer| rule.triggers.iter().any(|t| *t == answer.as_str()))
        })
        .map(|rule| rule.issue)
        .collect()
}
