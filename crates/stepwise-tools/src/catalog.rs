//! The fixed catalog of built-in tools.

use std::sync::Arc;
use stepwise_core::Tool;

use crate::registry::{ToolFactoryRegistry, ToolKey, ToolPlugin};
use crate::settings::ToolSettings;
use crate::standard::{
    CreateIssueTool, EditIssueTool, GithubRepoSearchTool, ListProjectsTool, ReadEmailTool, ReadFileTool,
    SearchIssuesTool, SendEmailTool, SendEmailWithAttachmentTool, WebSearchTool, WriteFileTool,
};

/// Built-in tools, in the order every step receives them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinTool {
    WebSearch,
    WriteFile,
    ReadFile,
    ReadEmail,
    SendEmail,
    SendEmailWithAttachment,
    CreateIssue,
    SearchIssues,
    ListProjects,
    EditIssue,
    GithubRepoSearch,
}

impl BuiltinTool {
    pub const ALL: [BuiltinTool; 11] = [
        BuiltinTool::WebSearch,
        BuiltinTool::WriteFile,
        BuiltinTool::ReadFile,
        BuiltinTool::ReadEmail,
        BuiltinTool::SendEmail,
        BuiltinTool::SendEmailWithAttachment,
        BuiltinTool::CreateIssue,
        BuiltinTool::SearchIssues,
        BuiltinTool::ListProjects,
        BuiltinTool::EditIssue,
        BuiltinTool::GithubRepoSearch,
    ];

    /// Module path and class a descriptor uses to name this tool.
    pub fn key(&self) -> ToolKey {
        let (module, class) = match self {
            BuiltinTool::WebSearch => ("google_search::google_search", "GoogleSearchTool"),
            BuiltinTool::WriteFile => ("file::write_file", "WriteFileTool"),
            BuiltinTool::ReadFile => ("file::read_file", "ReadFileTool"),
            BuiltinTool::ReadEmail => ("email::read_email", "ReadEmailTool"),
            BuiltinTool::SendEmail => ("email::send_email", "SendEmailTool"),
            BuiltinTool::SendEmailWithAttachment => ("email::send_email_attachment", "SendEmailAttachmentTool"),
            BuiltinTool::CreateIssue => ("jira::create_issue", "CreateIssueTool"),
            BuiltinTool::SearchIssues => ("jira::search_issues", "SearchJiraTool"),
            BuiltinTool::ListProjects => ("jira::get_projects", "GetProjectsTool"),
            BuiltinTool::EditIssue => ("jira::edit_issue", "EditIssueTool"),
            BuiltinTool::GithubRepoSearch => ("github::search_repo", "GithubRepoSearchTool"),
        };
        ToolKey::new(module, class)
    }

    pub fn instantiate(&self, settings: &ToolSettings) -> Arc<dyn Tool> {
        match self {
            BuiltinTool::WebSearch => Arc::new(WebSearchTool::new(settings)),
            BuiltinTool::WriteFile => Arc::new(WriteFileTool::new(settings.resources_dir.clone())),
            BuiltinTool::ReadFile => Arc::new(ReadFileTool::new(settings.resources_dir.clone())),
            BuiltinTool::ReadEmail => Arc::new(ReadEmailTool::new(settings)),
            BuiltinTool::SendEmail => Arc::new(SendEmailTool::new(settings)),
            BuiltinTool::SendEmailWithAttachment => Arc::new(SendEmailWithAttachmentTool::new(settings)),
            BuiltinTool::CreateIssue => Arc::new(CreateIssueTool::new(settings)),
            BuiltinTool::SearchIssues => Arc::new(SearchIssuesTool::new(settings)),
            BuiltinTool::ListProjects => Arc::new(ListProjectsTool::new(settings)),
            BuiltinTool::EditIssue => Arc::new(EditIssueTool::new(settings)),
            BuiltinTool::GithubRepoSearch => Arc::new(GithubRepoSearchTool::new(settings)),
        }
    }
}

/// Registers every built-in under its descriptor key.
#[derive(Debug, Default)]
pub struct BuiltinTools;

impl ToolPlugin for BuiltinTools {
    fn name(&self) -> &str {
        "builtin"
    }

    fn register(&self, registry: &mut ToolFactoryRegistry) {
        for tool in BuiltinTool::ALL {
            let key = tool.key();
            registry.register(key.module, key.class, move |settings| Ok(tool.instantiate(settings)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn catalog_names_and_keys_are_unique() {
        let settings = ToolSettings::default();
        let names: HashSet<String> = BuiltinTool::ALL
            .iter()
            .map(|t| t.instantiate(&settings).name().to_string())
            .collect();
        let keys: HashSet<ToolKey> = BuiltinTool::ALL.iter().map(BuiltinTool::key).collect();
        assert_eq!(names.len(), BuiltinTool::ALL.len());
        assert_eq!(keys.len(), BuiltinTool::ALL.len());
    }

    #[test]
    fn catalog_starts_with_search_and_file_tools() {
        let settings = ToolSettings::default();
        let first: Vec<String> = BuiltinTool::ALL[..3]
            .iter()
            .map(|t| t.instantiate(&settings).name().to_string())
            .collect();
        assert_eq!(first, vec!["Web Search", "Write File", "Read File"]);
    }

    #[test]
    fn plugin_registers_every_builtin() {
        let mut registry = ToolFactoryRegistry::new();
        registry.install(&BuiltinTools);
        assert_eq!(registry.len(), BuiltinTool::ALL.len());
        assert!(registry.contains(&ToolKey::new("github::search_repo", "GithubRepoSearchTool")));
    }
}
