//! The Form action: a sequence of Click/Type/Upload/Menu steps run in order.
//!
//! Steps run through the same executors as the standalone actions and share
//! the context. There is no rollback: when step `k` fails, steps `0..k` stay
//! applied and the error reports `k` together with the step's own failure.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;
use webcell_core::{Error, Result, SchemaPolicy};

use crate::action::ActionKind;
use crate::interact::{ClickTool, MenuTool, TypeTool, UploadTool};
use crate::{parse_params, Context, Tool, ToolSchema};

/// One step of a form. Only element-level actions may appear here.
#[derive(Debug, Clone)]
pub enum FormStep {
    Click(ClickTool),
    Type(TypeTool),
    Upload(UploadTool),
    Menu(MenuTool),
}

impl FormStep {
    pub const KINDS: [ActionKind; 4] = [ActionKind::Click, ActionKind::Type, ActionKind::Upload, ActionKind::Menu];

    fn parse(kind: ActionKind, input: &Value, policy: SchemaPolicy) -> Result<Self> {
        match kind {
            ActionKind::Click => parse_params(input, policy).map(FormStep::Click),
            ActionKind::Type => parse_params(input, policy).map(FormStep::Type),
            ActionKind::Upload => parse_params(input, policy).map(FormStep::Upload),
            ActionKind::Menu => parse_params(input, policy).map(FormStep::Menu),
            other => Err(Error::Validation(format!("{} cannot be a form step", other.name()))),
        }
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            FormStep::Click(_) => ActionKind::Click,
            FormStep::Type(_) => ActionKind::Type,
            FormStep::Upload(_) => ActionKind::Upload,
            FormStep::Menu(_) => ActionKind::Menu,
        }
    }

    async fn execute(self, ctx: &mut Context) -> Result<String> {
        match self {
            FormStep::Click(tool) => tool.execute(ctx).await,
            FormStep::Type(tool) => tool.execute(ctx).await,
            FormStep::Upload(tool) => tool.execute(ctx).await,
            FormStep::Menu(tool) => tool.execute(ctx).await,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FormTool {
    pub tool_names: Vec<String>,
    pub tool_inputs: Vec<Value>,
}

impl FormTool {
    /// Pair names with inputs and validate every step up front.
    pub fn steps(&self, policy: SchemaPolicy) -> Result<Vec<FormStep>> {
        if self.tool_names.len() != self.tool_inputs.len() {
            return Err(Error::Validation(format!(
                "'tool_names' has {} entries but 'tool_inputs' has {}",
                self.tool_names.len(),
                self.tool_inputs.len()
            )));
        }
        if self.tool_names.is_empty() {
            return Err(Error::Validation("a form needs at least one step".to_string()));
        }

        self.tool_names
            .iter()
            .zip(&self.tool_inputs)
            .enumerate()
            .map(|(step, (name, input))| {
                let kind = ActionKind::from_name(name)
                    .filter(|k| FormStep::KINDS.contains(k))
                    .ok_or_else(|| {
                        Error::Validation(format!(
                            "step {}: '{}' is not one of Click Tool, Type Tool, Upload Tool, Menu Tool",
                            step, name
                        ))
                    })?;
                FormStep::parse(kind, input, policy).map_err(|e| match e {
                    Error::Validation(msg) => {
                        Error::Validation(format!("step {} ({}): {}", step, kind.name(), msg))
                    }
                    other => other,
                })
            })
            .collect()
    }
}

#[async_trait]
impl Tool for FormTool {
    fn schema() -> ToolSchema {
        ToolSchema {
            name: "Form Tool",
            description: "To fill input fields of application form",
            parameters: json!({
                "type": "object",
                "properties": {
                    "tool_names": {
                        "type": "array",
                        "items": {"type": "string", "enum": ["Click Tool", "Type Tool", "Upload Tool", "Menu Tool"]},
                        "description": "the tools to apply to the form fields, in order"
                    },
                    "tool_inputs": {
                        "type": "array",
                        "items": {"type": "object"},
                        "description": "the parameters of each tool, in the same order as tool_names"
                    }
                },
                "required": ["tool_names", "tool_inputs"]
            }),
        }
    }

    fn validate(&self, policy: SchemaPolicy) -> Result<()> {
        self.steps(policy).map(|_| ())
    }

    async fn execute(self, ctx: &mut Context) -> Result<String> {
        let steps = self.steps(ctx.config().schema_policy)?;
        for (step, form_step) in steps.into_iter().enumerate() {
            let kind = form_step.kind();
            let outcome = form_step.execute(ctx).await.map_err(|e| Error::FormStep {
                step,
                tool: kind.name().to_string(),
                source: Box::new(e),
            })?;
            debug!(step, tool = kind.name(), outcome = %outcome, "Form step done");
        }
        Ok(format!("Filled form with inputs {}", Value::Array(self.tool_inputs)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::context::tests::{fake_context, page0};
    use crate::browser::fake;

    fn form(names: &[&str], inputs: Vec<Value>) -> FormTool {
        FormTool {
            tool_names: names.iter().map(|n| n.to_string()).collect(),
            tool_inputs: inputs,
        }
    }

    fn form_page() -> Vec<crate::browser::RawElement> {
        vec![
            fake::textbox(10, "First name"),
            fake::textbox(11, "Last name"),
            fake::checkbox(12, "Subscribe"),
            fake::textbox(13, "Email"),
            fake::select(14, "Country"),
        ]
    }

    #[tokio::test]
    async fn test_steps_run_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let (browser, mut ctx) = fake_context(dir.path()).await;
        page0(&browser).set_elements(form_page());
        page0(&browser).set_options(14, &["Norway", "Peru"]);
        ctx.refresh_snapshot().await.unwrap();
        page0(&browser).clear_log();

        let tool = form(
            &["Type Tool", "click", "Menu Tool"],
            vec![
                json!({"index": 0, "text": "Ada"}),
                json!({"index": 2}),
                json!({"index": 4, "labels": ["Peru"]}),
            ],
        );
        let out = tool.execute(&mut ctx).await.unwrap();
        assert!(out.starts_with("Filled form with inputs [{"));
        assert!(out.contains("\"text\":\"Ada\""));

        let effects: Vec<String> = page0(&browser)
            .log()
            .into_iter()
            .filter(|e| e.starts_with("type_text") || e.starts_with("check") || e.starts_with("select_options"))
            .collect();
        assert_eq!(effects, vec!["type_text:10:Ada", "check:12", "select_options:14:Peru"]);
    }

    #[tokio::test]
    async fn test_failed_step_stops_the_form() {
        let dir = tempfile::tempdir().unwrap();
        let (browser, mut ctx) = fake_context(dir.path()).await;
        page0(&browser).set_elements(vec![
            fake::link(1, "Home"),
            fake::link(2, "About"),
            fake::button(3, "Apply"),
            fake::textbox(4, "Name"),
        ]);
        ctx.refresh_snapshot().await.unwrap();
        page0(&browser).fail_on("click", || Error::Browser("element is covered".into()));

        let tool = form(
            &["Click Tool", "Type Tool"],
            vec![json!({"index": 2}), json!({"index": 3, "text": "X"})],
        );
        let err = tool.execute(&mut ctx).await.unwrap_err();
        match err {
            Error::FormStep { step, tool, source } => {
                assert_eq!(step, 0);
                assert_eq!(tool, "Click Tool");
                assert!(matches!(*source, Error::Browser(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!page0(&browser).log().iter().any(|e| e.starts_with("type_text")));
    }

    #[tokio::test]
    async fn test_later_step_failure_keeps_earlier_effects() {
        let dir = tempfile::tempdir().unwrap();
        let (browser, mut ctx) = fake_context(dir.path()).await;
        page0(&browser).set_elements(form_page());
        ctx.refresh_snapshot().await.unwrap();

        let tool = form(
            &["Type", "Click"],
            vec![json!({"index": 1, "text": "Lovelace"}), json!({"index": 9})],
        );
        let err = tool.execute(&mut ctx).await.unwrap_err();
        assert!(matches!(err, Error::FormStep { step: 1, .. }));
        assert!(page0(&browser).log().contains(&"type_text:11:Lovelace".to_string()));
    }

    #[test]
    fn test_validation() {
        let p = SchemaPolicy::Permissive;

        let mismatch = form(&["Click Tool", "Click Tool"], vec![json!({"index": 1})]);
        assert!(matches!(mismatch.steps(p), Err(Error::Validation(_))));

        let not_a_step = form(&["GoTo Tool"], vec![json!({"url": "https://a.test"})]);
        assert!(matches!(not_a_step.steps(p), Err(Error::Validation(ref m)) if m.contains("step 0")));

        let bad_input = form(&["Click Tool", "Type Tool"], vec![json!({"index": 1}), json!({"index": 2})]);
        assert!(matches!(
            bad_input.steps(p),
            Err(Error::Validation(ref m)) if m.starts_with("step 1 (Type Tool)")
        ));

        assert!(matches!(form(&[], vec![]).steps(p), Err(Error::Validation(_))));
    }

    #[test]
    fn test_strict_policy_applies_to_steps() {
        let tool = form(&["Click Tool"], vec![json!({"index": 1, "why": "submit"})]);
        assert!(tool.steps(SchemaPolicy::Permissive).is_ok());
        assert!(tool.steps(SchemaPolicy::Strict).is_err());
    }
}
