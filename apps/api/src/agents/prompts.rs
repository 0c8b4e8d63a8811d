// Prompt templates for LLM interactions
//
// Templates use `{{name}}` placeholders. Rendering logs the template name and
// version at debug level so a change in wording can be traced.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{(\w+)\}\}").expect("valid regex"));

/// Prompt template structure
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    pub name: String,
    pub version: String,
    pub system: String,
    pub user_template: String,
}

impl PromptTemplate {
    /// Render the user template, replacing every `{{key}}` with its value
    ///
    /// Placeholders without a matching variable are left untouched.
    /// Substitution is a single pass, so values are never re-expanded.
    pub fn render(&self, variables: &HashMap<String, String>) -> String {
        tracing::debug!(prompt = %self.name, version = %self.version, "rendering prompt");
        PLACEHOLDER
            .replace_all(&self.user_template, |caps: &Captures| match variables.get(&caps[1]) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            })
            .into_owned()
    }

    /// Convenience wrapper around [`PromptTemplate::render`] for literal pairs
    pub fn render_with(&self, pairs: &[(&str, &str)]) -> String {
        let variables = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.render(&variables)
    }
}

pub mod library {
    use super::PromptTemplate;

    pub fn task_understanding() -> PromptTemplate {
        PromptTemplate {
            name: "task_understanding".to_string(),
            version: "1.0.0".to_string(),
            system: "You analyse tasks for an agent pipeline and answer in JSON only."
                .to_string(),
            user_template: "Analyse the following task and extract the key information.\n\
                            Task: {{instruction}}\n\n\
                            Return JSON:\n\
                            {\n  \"goal\": \"task goal\",\n  \"steps\": [\"step 1\", \"step 2\"],\n  \
                            \"resources\": [\"resource\"],\n  \"expected_result\": \"expected result\",\n  \
                            \"keywords\": [\"keyword\"]\n}"
                .to_string(),
        }
    }

    pub fn code_generation() -> PromptTemplate {
        PromptTemplate {
            name: "code_generation".to_string(),
            version: "1.0.0".to_string(),
            system: "You write small, complete Python programs.".to_string(),
            user_template: "Generate Python code for the task below.\n\n\
                            Task: {{description}}\n\
                            Context: {{context}}\n\n\
                            Requirements:\n\
                            1. The code is complete and runnable\n\
                            2. Include the necessary error handling\n\
                            3. Store the outcome in a variable named `result`\n\
                            4. Return only code, no explanation"
                .to_string(),
        }
    }

    pub fn gui_action() -> PromptTemplate {
        PromptTemplate {
            name: "gui_action".to_string(),
            version: "1.0.0".to_string(),
            system: "You operate a desktop by emitting PyAutoGUI calls.".to_string(),
            user_template: "Look at the attached screenshot and produce the next actions.\n\n\
                            Task: {{task}}\n\n\
                            Emit PyAutoGUI calls such as:\n\
                            - pyautogui.moveTo(x, y)\n\
                            - pyautogui.click()\n\
                            - pyautogui.typewrite(\"text\")\n\n\
                            Reply DONE when the task is finished, FAIL when it cannot be done \
                            and WAIT when the screen needs time to settle."
                .to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_replaces_placeholders() {
        let template = library::code_generation();
        let rendered = template.render_with(&[("description", "sum numbers"), ("context", "none")]);

        assert!(rendered.contains("Task: sum numbers"));
        assert!(rendered.contains("Context: none"));
        assert!(!rendered.contains("{{description}}"));
    }

    #[test]
    fn render_keeps_unknown_placeholders() {
        let template = PromptTemplate {
            name: "t".to_string(),
            version: "1".to_string(),
            system: String::new(),
            user_template: "{{a}} and {{b}}".to_string(),
        };

        assert_eq!(template.render_with(&[("a", "x")]), "x and {{b}}");
    }

    #[test]
    fn render_does_not_expand_placeholders_inside_values() {
        let template = PromptTemplate {
            name: "t".to_string(),
            version: "1".to_string(),
            system: String::new(),
            user_template: "Task: {{task}} / {{context}}".to_string(),
        };

        let rendered = template.render_with(&[("task", "print {{context}}"), ("context", "none")]);

        assert_eq!(rendered, "Task: print {{context}} / none");
    }

    #[test]
    fn understanding_prompt_embeds_instruction() {
        let rendered = library::task_understanding().render_with(&[("instruction", "open notepad")]);
        assert!(rendered.contains("Task: open notepad"));
        assert!(rendered.contains("\"steps\""));
    }
}
