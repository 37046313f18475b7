//! The closed set of action kinds and the parsed, ready-to-run action.

use serde_json::Value;
use webcell_core::{Result, SchemaPolicy};

use crate::clipboard::ClipboardTool;
use crate::done::DoneTool;
use crate::download::DownloadTool;
use crate::extract::ExtractTool;
use crate::form::FormTool;
use crate::interact::{ClickTool, MenuTool, TypeTool, UploadTool};
use crate::navigate::{BackTool, GoToTool, KeyTool, ScrollTool, WaitTool};
use crate::tab::TabTool;
use crate::{parse_params, Context, Tool, ToolSchema};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Click,
    Type,
    Wait,
    Scroll,
    GoTo,
    Back,
    Key,
    Download,
    Extract,
    Tab,
    Upload,
    Menu,
    Form,
    Clipboard,
    Done,
}

impl ActionKind {
    pub const ALL: [ActionKind; 15] = [
        ActionKind::Click,
        ActionKind::Type,
        ActionKind::Wait,
        ActionKind::Scroll,
        ActionKind::GoTo,
        ActionKind::Back,
        ActionKind::Key,
        ActionKind::Download,
        ActionKind::Extract,
        ActionKind::Tab,
        ActionKind::Upload,
        ActionKind::Menu,
        ActionKind::Form,
        ActionKind::Clipboard,
        ActionKind::Done,
    ];

    /// The name the decision process calls the action by.
    pub fn name(self) -> &'static str {
        match self {
            ActionKind::Click => "Click Tool",
            ActionKind::Type => "Type Tool",
            ActionKind::Wait => "Wait Tool",
            ActionKind::Scroll => "Scroll Tool",
            ActionKind::GoTo => "GoTo Tool",
            ActionKind::Back => "Back Tool",
            ActionKind::Key => "Key Tool",
            ActionKind::Download => "Download Tool",
            ActionKind::Extract => "Extract Tool",
            ActionKind::Tab => "Tab Tool",
            ActionKind::Upload => "Upload Tool",
            ActionKind::Menu => "Menu Tool",
            ActionKind::Form => "Form Tool",
            ActionKind::Clipboard => "Clipboard Tool",
            ActionKind::Done => "Done Tool",
        }
    }

    pub fn short_name(self) -> &'static str {
        match self {
            ActionKind::Click => "Click",
            ActionKind::Type => "Type",
            ActionKind::Wait => "Wait",
            ActionKind::Scroll => "Scroll",
            ActionKind::GoTo => "GoTo",
            ActionKind::Back => "Back",
            ActionKind::Key => "Key",
            ActionKind::Download => "Download",
            ActionKind::Extract => "Extract",
            ActionKind::Tab => "Tab",
            ActionKind::Upload => "Upload",
            ActionKind::Menu => "Menu",
            ActionKind::Form => "Form",
            ActionKind::Clipboard => "Clipboard",
            ActionKind::Done => "Done",
        }
    }

    /// Look up by full or short name, ignoring ASCII case.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(name) || k.short_name().eq_ignore_ascii_case(name))
    }

    pub fn schema(self) -> ToolSchema {
        match self {
            ActionKind::Click => ClickTool::schema(),
            ActionKind::Type => TypeTool::schema(),
            ActionKind::Wait => WaitTool::schema(),
            ActionKind::Scroll => ScrollTool::schema(),
            ActionKind::GoTo => GoToTool::schema(),
            ActionKind::Back => BackTool::schema(),
            ActionKind::Key => KeyTool::schema(),
            ActionKind::Download => DownloadTool::schema(),
            ActionKind::Extract => ExtractTool::schema(),
            ActionKind::Tab => TabTool::schema(),
            ActionKind::Upload => UploadTool::schema(),
            ActionKind::Menu => MenuTool::schema(),
            ActionKind::Form => FormTool::schema(),
            ActionKind::Clipboard => ClipboardTool::schema(),
            ActionKind::Done => DoneTool::schema(),
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A validated action, carrying its parameters.
#[derive(Debug, Clone)]
pub enum Action {
    Click(ClickTool),
    Type(TypeTool),
    Wait(WaitTool),
    Scroll(ScrollTool),
    GoTo(GoToTool),
    Back(BackTool),
    Key(KeyTool),
    Download(DownloadTool),
    Extract(ExtractTool),
    Tab(TabTool),
    Upload(UploadTool),
    Menu(MenuTool),
    Form(FormTool),
    Clipboard(ClipboardTool),
    Done(DoneTool),
}

impl Action {
    /// Validate `params` against `kind`'s schema. Nothing touches the
    /// browser until the result is executed.
    pub fn parse(kind: ActionKind, params: &Value, policy: SchemaPolicy) -> Result<Self> {
        let action = match kind {
            ActionKind::Click => parse_params(params, policy).map(Action::Click),
            ActionKind::Type => parse_params(params, policy).map(Action::Type),
            ActionKind::Wait => parse_params(params, policy).map(Action::Wait),
            ActionKind::Scroll => parse_params(params, policy).map(Action::Scroll),
            ActionKind::GoTo => parse_params(params, policy).map(Action::GoTo),
            ActionKind::Back => parse_params(params, policy).map(Action::Back),
            ActionKind::Key => parse_params(params, policy).map(Action::Key),
            ActionKind::Download => parse_params(params, policy).map(Action::Download),
            ActionKind::Extract => parse_params(params, policy).map(Action::Extract),
            ActionKind::Tab => parse_params(params, policy).map(Action::Tab),
            ActionKind::Upload => parse_params(params, policy).map(Action::Upload),
            ActionKind::Menu => parse_params(params, policy).map(Action::Menu),
            ActionKind::Form => parse_params(params, policy).map(Action::Form),
            ActionKind::Clipboard => parse_params(params, policy).map(Action::Clipboard),
            ActionKind::Done => parse_params(params, policy).map(Action::Done),
        };
        action.map_err(|e| e.in_action(kind.name()))
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Click(_) => ActionKind::Click,
            Action::Type(_) => ActionKind::Type,
            Action::Wait(_) => ActionKind::Wait,
            Action::Scroll(_) => ActionKind::Scroll,
            Action::GoTo(_) => ActionKind::GoTo,
            Action::Back(_) => ActionKind::Back,
            Action::Key(_) => ActionKind::Key,
            Action::Download(_) => ActionKind::Download,
            Action::Extract(_) => ActionKind::Extract,
            Action::Tab(_) => ActionKind::Tab,
            Action::Upload(_) => ActionKind::Upload,
            Action::Menu(_) => ActionKind::Menu,
            Action::Form(_) => ActionKind::Form,
            Action::Clipboard(_) => ActionKind::Clipboard,
            Action::Done(_) => ActionKind::Done,
        }
    }

    pub async fn execute(self, ctx: &mut Context) -> Result<String> {
        let kind = self.kind();
        let result = match self {
            Action::Click(tool) => tool.execute(ctx).await,
            Action::Type(tool) => tool.execute(ctx).await,
            Action::Wait(tool) => tool.execute(ctx).await,
            Action::Scroll(tool) => tool.execute(ctx).await,
            Action::GoTo(tool) => tool.execute(ctx).await,
            Action::Back(tool) => tool.execute(ctx).await,
            Action::Key(tool) => tool.execute(ctx).await,
            Action::Download(tool) => tool.execute(ctx).await,
            Action::Extract(tool) => tool.execute(ctx).await,
            Action::Tab(tool) => tool.execute(ctx).await,
            Action::Upload(tool) => tool.execute(ctx).await,
            Action::Menu(tool) => tool.execute(ctx).await,
            Action::Form(tool) => tool.execute(ctx).await,
            Action::Clipboard(tool) => tool.execute(ctx).await,
            Action::Done(tool) => tool.execute(ctx).await,
        };
        result.map_err(|e| e.in_action(kind.name()))
    }
}
