//! Static portfolio knowledge base.
//!
//! The tool executors are pure reads over this data; nothing in the pipeline
//! mutates it. Payloads are embedded at compile time so the service has no
//! runtime data dependencies.

use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

static RESUME: LazyLock<Resume> = LazyLock::new(|| {
    serde_json::from_str(include_str!("../data/resume.json")).expect("embedded resume.json is valid")
});

static PROJECTS: LazyLock<ProjectsFile> = LazyLock::new(|| {
    serde_json::from_str(include_str!("../data/projects.json"))
        .expect("embedded projects.json is valid")
});

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resume {
    pub personal: Personal,
    pub skills: Skills,
    pub achievements: Vec<String>,
    pub experience: Vec<Experience>,
    pub availability: Availability,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Personal {
    pub name: String,
    pub title: String,
    pub bio: String,
    pub email: String,
    pub linkedin: String,
    pub github: String,
    pub location: String,
    pub years_of_experience: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Skills {
    pub languages: Vec<Language>,
    pub frameworks: Vec<String>,
    pub technologies: Vec<String>,
    pub practices: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Language {
    pub name: String,
    pub years: u32,
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experience {
    pub company: String,
    pub role: String,
    pub period: String,
    pub highlights: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Availability {
    pub status: String,
    pub types: Vec<String>,
    pub remote_preference: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectsFile {
    projects: Vec<Project>,
    open_source: Vec<OpenSourceProject>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub description: String,
    pub technologies: Vec<String>,
    pub highlights: Vec<String>,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenSourceProject {
    pub name: String,
    pub description: String,
    pub contributions: Vec<String>,
}

/// Read-only view over the embedded portfolio data.
#[derive(Debug, Clone, Copy, Default)]
pub struct KnowledgeBase;

impl KnowledgeBase {
    pub fn resume(&self) -> &'static Resume {
        &RESUME
    }

    pub fn projects(&self) -> &'static [Project] {
        &PROJECTS.projects
    }

    pub fn open_source(&self) -> &'static [OpenSourceProject] {
        &PROJECTS.open_source
    }

    /// Name of the portfolio owner, as the guardrail and prompts refer to it.
    pub fn owner_first_name(&self) -> String {
        self.resume()
            .personal
            .name
            .split_whitespace()
            .next()
            .unwrap_or("the owner")
            .to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_payloads_parse() {
        let kb = KnowledgeBase;
        assert!(!kb.resume().skills.languages.is_empty());
        assert!(!kb.projects().is_empty());
        assert!(kb
            .open_source()
            .iter()
            .any(|p| p.name.to_lowercase().contains("cpython")));
    }

    #[test]
    fn owner_first_name_is_lowercased() {
        assert_eq!(KnowledgeBase.owner_first_name(), "abdul");
    }
}
