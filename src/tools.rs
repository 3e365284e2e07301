//! Portfolio knowledge-lookup tools.
//!
//! A closed set of read-only functions the model may invoke. Dispatch is a
//! static name lookup into the `PortfolioTool` enum; an unrecognized name
//! produces an error-shaped `ToolResult` so the agent loop keeps going.

use serde_json::{json, Value};

use crate::knowledge::KnowledgeBase;
use crate::llm::ToolSchema;
use crate::message::{ToolCall, ToolResult};

/// Tools that signal strong commercial intent when the model reaches for them.
pub const HIGH_VALUE_TOOLS: [&str; 3] =
    ["schedule_meeting", "check_availability", "get_contact_info"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortfolioTool {
    GetContactInfo,
    ScheduleMeeting,
    ShowcasePortfolio,
    RetrieveDocuments,
    AssessSkills,
    GetProjectDetails,
    GetWorkExperience,
    CheckAvailability,
    GetOpensourceContributions,
}

impl PortfolioTool {
    pub const ALL: [PortfolioTool; 9] = [
        PortfolioTool::GetContactInfo,
        PortfolioTool::ScheduleMeeting,
        PortfolioTool::ShowcasePortfolio,
        PortfolioTool::RetrieveDocuments,
        PortfolioTool::AssessSkills,
        PortfolioTool::GetProjectDetails,
        PortfolioTool::GetWorkExperience,
        PortfolioTool::CheckAvailability,
        PortfolioTool::GetOpensourceContributions,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PortfolioTool::GetContactInfo => "get_contact_info",
            PortfolioTool::ScheduleMeeting => "schedule_meeting",
            PortfolioTool::ShowcasePortfolio => "showcase_portfolio",
            PortfolioTool::RetrieveDocuments => "retrieve_documents",
            PortfolioTool::AssessSkills => "assess_skills",
            PortfolioTool::GetProjectDetails => "get_project_details",
            PortfolioTool::GetWorkExperience => "get_work_experience",
            PortfolioTool::CheckAvailability => "check_availability",
            PortfolioTool::GetOpensourceContributions => "get_opensource_contributions",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.name() == name)
    }

    fn description(self) -> &'static str {
        match self {
            PortfolioTool::GetContactInfo => {
                "Get contact information including email, LinkedIn, GitHub, and location."
            }
            PortfolioTool::ScheduleMeeting => {
                "Get information about scheduling a meeting or call, including availability."
            }
            PortfolioTool::ShowcasePortfolio => {
                "List portfolio projects, optionally filtered by category or technology."
            }
            PortfolioTool::RetrieveDocuments => {
                "Get the resume, CV, or professional summary documents."
            }
            PortfolioTool::AssessSkills => {
                "Get detailed information about technical skills, languages, frameworks, and practices."
            }
            PortfolioTool::GetProjectDetails => {
                "Get detailed information about a specific portfolio project."
            }
            PortfolioTool::GetWorkExperience => {
                "Get detailed work history, professional experience, and career achievements."
            }
            PortfolioTool::CheckAvailability => {
                "Check current availability for new opportunities, contracts, or collaborations."
            }
            PortfolioTool::GetOpensourceContributions => {
                "Get information about open-source contributions, especially CPython core work."
            }
        }
    }

    fn parameters(self) -> Value {
        match self {
            PortfolioTool::ShowcasePortfolio => json!({
                "type": "object",
                "properties": {
                    "category": {
                        "type": "string",
                        "description": "Optional: filter projects by technology or category (e.g. 'python', 'react', 'backend')"
                    }
                }
            }),
            PortfolioTool::ScheduleMeeting => json!({
                "type": "object",
                "properties": {
                    "topic": {
                        "type": "string",
                        "description": "Optional: the topic or purpose of the meeting"
                    }
                }
            }),
            PortfolioTool::RetrieveDocuments => json!({
                "type": "object",
                "properties": {
                    "documentType": {
                        "type": "string",
                        "enum": ["resume", "cv", "summary"],
                        "description": "Type of document to retrieve"
                    }
                }
            }),
            PortfolioTool::AssessSkills => json!({
                "type": "object",
                "properties": {
                    "skillCategory": {
                        "type": "string",
                        "description": "Optional: specific skill category to focus on"
                    }
                }
            }),
            PortfolioTool::GetProjectDetails => json!({
                "type": "object",
                "properties": {
                    "projectName": {
                        "type": "string",
                        "description": "Name or id of the project to get details about"
                    }
                },
                "required": ["projectName"]
            }),
            PortfolioTool::GetOpensourceContributions => json!({
                "type": "object",
                "properties": {
                    "focus": {
                        "type": "string",
                        "enum": ["cpython", "general", "all"],
                        "description": "Optional: specific project to focus on"
                    }
                }
            }),
            _ => json!({ "type": "object", "properties": {} }),
        }
    }

    pub fn schema(self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

/// Dispatcher over the closed tool set, bound to the knowledge base.
#[derive(Debug, Clone, Copy, Default)]
pub struct Toolbox {
    kb: KnowledgeBase,
}

impl Toolbox {
    pub fn new(kb: KnowledgeBase) -> Self {
        Self { kb }
    }

    pub fn schemas(&self) -> Vec<ToolSchema> {
        PortfolioTool::ALL.iter().map(|tool| tool.schema()).collect()
    }

    /// Execute one tool call. Never fails: unknown tools and executor misses
    /// become error payloads the model can read and recover from.
    pub fn dispatch(&self, call: &ToolCall) -> ToolResult {
        let payload = match PortfolioTool::from_name(&call.name) {
            Some(tool) => self.execute(tool, &call.arguments),
            None => json!({
                "error": format!("Tool `{}` not found", call.name),
                "availableTools": PortfolioTool::ALL.iter().map(|t| t.name()).collect::<Vec<_>>(),
            }),
        };
        ToolResult {
            tool_call_id: call.id.clone(),
            name: call.name.clone(),
            content: payload.to_string(),
        }
    }

    fn execute(&self, tool: PortfolioTool, args: &Value) -> Value {
        match tool {
            PortfolioTool::GetContactInfo => self.contact_info(),
            PortfolioTool::ScheduleMeeting => self.schedule_meeting(args),
            PortfolioTool::ShowcasePortfolio => self.showcase_portfolio(args),
            PortfolioTool::RetrieveDocuments => self.retrieve_documents(args),
            PortfolioTool::AssessSkills => self.assess_skills(),
            PortfolioTool::GetProjectDetails => self.project_details(args),
            PortfolioTool::GetWorkExperience => self.work_experience(),
            PortfolioTool::CheckAvailability => self.check_availability(),
            PortfolioTool::GetOpensourceContributions => self.opensource_contributions(args),
        }
    }

    fn contact_info(&self) -> Value {
        let personal = &self.kb.resume().personal;
        json!({
            "name": personal.name,
            "email": personal.email,
            "linkedin": personal.linkedin,
            "github": personal.github,
            "location": personal.location,
            "message": "Feel free to reach out through any of these channels.",
        })
    }

    fn schedule_meeting(&self, args: &Value) -> Value {
        let topic = args.get("topic").and_then(Value::as_str);
        let availability = &self.kb.resume().availability;
        let suggested: Vec<String> = match topic {
            Some(topic) => vec![topic.to_string()],
            None => vec![
                "Technical discussion about my projects".into(),
                "Career opportunities and collaboration".into(),
                "Mentoring and knowledge sharing".into(),
                "Consulting and contract work".into(),
            ],
        };
        json!({
            "message": "I'd love to chat with you!",
            "suggestedTopics": suggested,
            "availability": availability.remote_preference,
        })
    }

    fn showcase_portfolio(&self, args: &Value) -> Value {
        let category = args
            .get("category")
            .and_then(Value::as_str)
            .map(str::to_lowercase);
        let all = self.kb.projects();
        let relevant: Vec<_> = match &category {
            Some(cat) => all
                .iter()
                .filter(|p| {
                    p.technologies.iter().any(|t| t.to_lowercase().contains(cat))
                        || p.name.to_lowercase().contains(cat)
                        || p.description.to_lowercase().contains(cat)
                })
                .collect(),
            None => all.iter().collect(),
        };
        json!({
            "message": "Here are some of my notable projects:",
            "projects": relevant,
            "totalProjects": all.len(),
        })
    }

    fn retrieve_documents(&self, args: &Value) -> Value {
        let document_type = args
            .get("documentType")
            .and_then(Value::as_str)
            .unwrap_or("summary");
        let resume = self.kb.resume();
        if document_type == "summary" {
            return json!({
                "name": resume.personal.name,
                "title": resume.personal.title,
                "bio": resume.personal.bio,
                "yearsOfExperience": resume.personal.years_of_experience,
                "topSkills": resume.skills.languages.iter().take(5).map(|s| &s.name).collect::<Vec<_>>(),
                "keyAchievements": resume.achievements.iter().take(3).collect::<Vec<_>>(),
            });
        }
        json!({
            "personal": resume.personal,
            "skills": resume.skills,
            "achievements": resume.achievements,
        })
    }

    fn assess_skills(&self) -> Value {
        let skills = &self.kb.resume().skills;
        json!({
            "message": "Here's a comprehensive overview of my technical skills:",
            "skills": skills,
            "highlights": [
                "10+ years Python (Senior level)",
                "8+ years C (Senior level)",
                "7+ years JavaScript/TypeScript (Senior level)",
                "Active CPython contributor",
                "Expert in Django, React, React Native",
                "Strong TDD and Agile practices",
            ],
        })
    }

    fn project_details(&self, args: &Value) -> Value {
        let requested = args
            .get("projectName")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_lowercase();
        let found = self
            .kb
            .projects()
            .iter()
            .find(|p| p.name.to_lowercase().contains(&requested) || p.id == requested);

        match found {
            Some(project) => serde_json::to_value(project).unwrap_or_default(),
            None => json!({
                "error": "Project not found",
                "availableProjects": self
                    .kb
                    .projects()
                    .iter()
                    .map(|p| json!({"id": p.id, "name": p.name}))
                    .collect::<Vec<_>>(),
                "message": "Please specify one of the available projects above.",
            }),
        }
    }

    fn work_experience(&self) -> Value {
        let resume = self.kb.resume();
        json!({
            "message": format!(
                "I have {}+ years of professional software engineering experience.",
                resume.personal.years_of_experience
            ),
            "experience": resume.experience,
            "achievements": resume.achievements,
        })
    }

    fn check_availability(&self) -> Value {
        let availability = &self.kb.resume().availability;
        json!({
            "status": availability.status,
            "opportunityTypes": availability.types,
            "remotePreference": availability.remote_preference,
            "message": "I'm actively exploring new opportunities! Let's discuss how I can contribute to your team.",
            "nextSteps": [
                "Tell me about the role or project",
                "Schedule a call to discuss further",
                "Share any specific requirements",
            ],
        })
    }

    fn opensource_contributions(&self, args: &Value) -> Value {
        let focus = args
            .get("focus")
            .and_then(Value::as_str)
            .unwrap_or("all")
            .to_lowercase();

        if focus == "cpython" || focus == "python" {
            if let Some(cpython) = self
                .kb
                .open_source()
                .iter()
                .find(|p| p.name.to_lowercase().contains("cpython"))
            {
                return json!({
                    "highlighted": true,
                    "project": cpython.name,
                    "description": cpython.description,
                    "contributions": cpython.contributions,
                    "significance": "Active contributor to CPython, the reference implementation of Python.",
                });
            }
        }

        json!({
            "openSourceProjects": self.kb.open_source(),
            "highlights": [
                "Active CPython contributor",
                "Multiple projects across Python and JavaScript ecosystems",
                "Focus on bug fixes, features, documentation, and community support",
            ],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, arguments: Value) -> ToolCall {
        ToolCall {
            id: "call_test".into(),
            name: name.into(),
            arguments,
        }
    }

    #[test]
    fn every_tool_resolves_by_name() {
        for tool in PortfolioTool::ALL {
            assert_eq!(PortfolioTool::from_name(tool.name()), Some(tool));
        }
        assert_eq!(PortfolioTool::from_name("launch_rockets"), None);
    }

    #[test]
    fn unknown_tool_yields_error_payload_not_failure() {
        let result = Toolbox::default().dispatch(&call("launch_rockets", json!({})));
        let payload: Value = serde_json::from_str(&result.content).unwrap();
        assert!(payload["error"].as_str().unwrap().contains("launch_rockets"));
        assert_eq!(result.tool_call_id, "call_test");
    }

    #[test]
    fn unknown_project_lists_available_alternatives() {
        let result = Toolbox::default().dispatch(&call(
            "get_project_details",
            json!({"projectName": "skynet"}),
        ));
        let payload: Value = serde_json::from_str(&result.content).unwrap();
        assert_eq!(payload["error"], "Project not found");
        let available = payload["availableProjects"].as_array().unwrap();
        assert!(!available.is_empty());
        assert!(available.iter().all(|p| p["name"].is_string()));
    }

    #[test]
    fn project_lookup_matches_by_id_and_partial_name() {
        let toolbox = Toolbox::default();
        let by_id = toolbox.dispatch(&call("get_project_details", json!({"projectName": "ledgerflow"})));
        let payload: Value = serde_json::from_str(&by_id.content).unwrap();
        assert_eq!(payload["name"], "LedgerFlow");

        let by_name = toolbox.dispatch(&call("get_project_details", json!({"projectName": "Mesh"})));
        let payload: Value = serde_json::from_str(&by_name.content).unwrap();
        assert_eq!(payload["id"], "meshnotes");
    }

    #[test]
    fn portfolio_filter_narrows_by_technology() {
        let toolbox = Toolbox::default();
        let filtered = toolbox.dispatch(&call("showcase_portfolio", json!({"category": "python"})));
        let payload: Value = serde_json::from_str(&filtered.content).unwrap();
        let projects = payload["projects"].as_array().unwrap();
        assert!(!projects.is_empty());
        for project in projects {
            let techs = project["technologies"].as_array().unwrap();
            let matches = techs.iter().any(|t| t.as_str().unwrap().to_lowercase().contains("python"))
                || project["name"].as_str().unwrap().to_lowercase().contains("python")
                || project["description"].as_str().unwrap().to_lowercase().contains("python");
            assert!(matches);
        }
    }

    #[test]
    fn cpython_focus_returns_highlighted_payload() {
        let result = Toolbox::default().dispatch(&call(
            "get_opensource_contributions",
            json!({"focus": "cpython"}),
        ));
        let payload: Value = serde_json::from_str(&result.content).unwrap();
        assert_eq!(payload["highlighted"], true);
        assert_eq!(payload["project"], "CPython");
    }

    #[test]
    fn schemas_cover_all_tools() {
        let schemas = Toolbox::default().schemas();
        assert_eq!(schemas.len(), PortfolioTool::ALL.len());
        let details = schemas
            .iter()
            .find(|s| s.name == "get_project_details")
            .unwrap();
        assert_eq!(details.parameters["required"][0], "projectName");
    }
}
