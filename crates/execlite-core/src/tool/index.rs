//! In-memory tool index keyed by name.
//!
//! Insertion order is preserved; it is the tie-break order for ranking.

use super::schema::Tool;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct ToolIndex {
    tools: Vec<Tool>,
    positions: HashMap<String, usize>,
}

impl ToolIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tools(tools: Vec<Tool>) -> Self {
        let mut index = Self::new();
        index.index_tools(tools);
        index
    }

    /// Merge `tools` into the index: an existing name is replaced in place,
    /// new names are appended in the given order.
    pub fn index_tools(&mut self, tools: Vec<Tool>) {
        for tool in tools {
            match self.positions.get(&tool.name) {
                Some(&pos) => self.tools[pos] = tool,
                None => {
                    self.positions.insert(tool.name.clone(), self.tools.len());
                    self.tools.push(tool);
                }
            }
        }
    }

    /// Exact, case-sensitive lookup.
    pub fn get_tool(&self, name: &str) -> Option<&Tool> {
        self.positions.get(name).map(|&pos| &self.tools[pos])
    }

    pub fn get_tools_by_category(&self, category: &str) -> Vec<&Tool> {
        self.tools.iter().filter(|t| t.category == category).collect()
    }

    /// Case-insensitive substring match over name and description.
    pub fn search(&self, keyword: &str) -> Vec<&Tool> {
        let needle = keyword.to_lowercase();
        self.tools
            .iter()
            .filter(|t| {
                t.name.to_lowercase().contains(&needle)
                    || t.description.to_lowercase().contains(&needle)
            })
            .collect()
    }

    /// Replace the tool with the same name. Returns whether it existed.
    pub fn update_tool(&mut self, tool: Tool) -> bool {
        match self.positions.get(&tool.name) {
            Some(&pos) => {
                self.tools[pos] = tool;
                true
            }
            None => false,
        }
    }

    /// Remove by name. Returns whether it existed.
    pub fn remove_tool(&mut self, name: &str) -> bool {
        let Some(pos) = self.positions.remove(name) else {
            return false;
        };
        self.tools.remove(pos);
        for p in self.positions.values_mut() {
            if *p > pos {
                *p -= 1;
            }
        }
        true
    }

    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn clear(&mut self) {
        self.tools.clear();
        self.positions.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ToolIndex {
        ToolIndex::from_tools(vec![
            Tool::new("read_file", "Read a text file").with_category("filesystem"),
            Tool::new("list_directory", "List entries").with_category("filesystem"),
            Tool::new("http_get", "Fetch a URL").with_category("network"),
        ])
    }

    #[test]
    fn test_lookup_is_case_sensitive() {
        let index = sample();
        assert!(index.get_tool("read_file").is_some());
        assert!(index.get_tool("READ_FILE").is_none());
    }

    #[test]
    fn test_merge_replaces_in_place_and_appends() {
        let mut index = sample();
        index.index_tools(vec![
            Tool::new("list_directory", "List directory entries recursively"),
            Tool::new("search_files", "Grep"),
        ]);
        let names: Vec<&str> = index.tools().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["read_file", "list_directory", "http_get", "search_files"]);
        assert_eq!(
            index.get_tool("list_directory").unwrap().description,
            "List directory entries recursively"
        );
    }

    #[test]
    fn test_search_and_category() {
        let index = sample();
        assert_eq!(index.search("FILE").len(), 1);
        assert_eq!(index.search("url")[0].name, "http_get");
        assert_eq!(index.get_tools_by_category("filesystem").len(), 2);
        assert!(index.get_tools_by_category("missing").is_empty());
    }

    #[test]
    fn test_update_and_remove_report_matches() {
        let mut index = sample();
        assert!(index.update_tool(Tool::new("http_get", "changed")));
        assert!(!index.update_tool(Tool::new("nope", "")));
        assert!(index.remove_tool("read_file"));
        assert!(!index.remove_tool("read_file"));
        assert_eq!(index.get_tool("http_get").unwrap().description, "changed");
        assert_eq!(index.len(), 2);
    }
}
