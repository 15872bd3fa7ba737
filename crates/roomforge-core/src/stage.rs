//! The stage model: the four ordered pipeline phases and the typed payloads
//! that flow between them.
//!
//! Each stage consumes exactly the output of the stage before it. The chain
//! is encoded in [`StageInput::following`], so a workflow can only ever hand
//! a stage the payload its predecessor produced.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::PipelineError;
use crate::room::RoomId;

/// One of the four ordered pipeline phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Narrative generation.
    Story,
    /// Art and audio asset generation.
    Asset,
    /// Playable code generation.
    Code,
    /// Publishing the generated room.
    Deploy,
}

impl Stage {
    /// Every stage, in execution order.
    pub const ORDER: [Stage; 4] = [Stage::Story, Stage::Asset, Stage::Code, Stage::Deploy];

    /// Lowercase wire name of the stage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Story => "story",
            Self::Asset => "asset",
            Self::Code => "code",
            Self::Deploy => "deploy",
        }
    }

    /// The stage that runs after this one, if any.
    #[must_use]
    pub const fn next(self) -> Option<Stage> {
        match self {
            Self::Story => Some(Self::Asset),
            Self::Asset => Some(Self::Code),
            Self::Code => Some(Self::Deploy),
            Self::Deploy => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "story" => Ok(Self::Story),
            "asset" => Ok(Self::Asset),
            "code" => Ok(Self::Code),
            "deploy" => Ok(Self::Deploy),
            other => Err(PipelineError::UnknownStage(other.to_owned())),
        }
    }
}

/// Static description of where and how long to call a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageDescriptor {
    /// The stage this descriptor addresses.
    pub stage: Stage,
    /// Deadline for a single call, measured from call start.
    pub timeout_ms: u64,
    /// HTTP endpoint that receives the stage's POST.
    pub endpoint: String,
}

/// Input supplied by whoever triggers a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowInput(pub Value);

/// Output of the story stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoryOutput(pub Value);

/// Output of the asset stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetOutput(pub Value);

/// Output of the code stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CodeOutput(pub Value);

/// Output of the deploy stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeployOutput(pub Value);

/// The input of one stage, built from the previous stage's output.
#[derive(Debug, Clone, PartialEq)]
pub enum StageInput {
    /// Story consumes the workflow's trigger input.
    Story(WorkflowInput),
    /// Asset consumes the story.
    Asset(StoryOutput),
    /// Code consumes the assets.
    Code(AssetOutput),
    /// Deploy consumes the generated code.
    Deploy(CodeOutput),
}

impl StageInput {
    /// The stage this input is addressed to.
    #[must_use]
    pub const fn stage(&self) -> Stage {
        match self {
            Self::Story(_) => Stage::Story,
            Self::Asset(_) => Stage::Asset,
            Self::Code(_) => Stage::Code,
            Self::Deploy(_) => Stage::Deploy,
        }
    }

    /// Builds the input of the next stage from a completed stage's output.
    /// Returns `None` after the final stage.
    #[must_use]
    pub fn following(output: &StageOutput) -> Option<StageInput> {
        match output {
            StageOutput::Story(story) => Some(Self::Asset(story.clone())),
            StageOutput::Asset(assets) => Some(Self::Code(assets.clone())),
            StageOutput::Code(code) => Some(Self::Deploy(code.clone())),
            StageOutput::Deploy(_) => None,
        }
    }

    /// JSON body POSTed to the stage endpoint.
    #[must_use]
    pub fn to_body(&self, room_id: &RoomId) -> Value {
        match self {
            Self::Story(input) => json!({ "roomId": room_id, "input": input }),
            Self::Asset(story) => json!({ "roomId": room_id, "story": story }),
            Self::Code(assets) => json!({ "roomId": room_id, "assets": assets }),
            Self::Deploy(code) => json!({ "roomId": room_id, "code": code }),
        }
    }
}

/// The result of one completed stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "stage", content = "payload", rename_all = "lowercase")]
pub enum StageOutput {
    /// Story stage result.
    Story(StoryOutput),
    /// Asset stage result.
    Asset(AssetOutput),
    /// Code stage result.
    Code(CodeOutput),
    /// Deploy stage result.
    Deploy(DeployOutput),
}

impl StageOutput {
    /// Wraps a raw stage response in the variant for `stage`.
    #[must_use]
    pub fn decode(stage: Stage, payload: Value) -> Self {
        match stage {
            Stage::Story => Self::Story(StoryOutput(payload)),
            Stage::Asset => Self::Asset(AssetOutput(payload)),
            Stage::Code => Self::Code(CodeOutput(payload)),
            Stage::Deploy => Self::Deploy(DeployOutput(payload)),
        }
    }

    /// The stage that produced this output.
    #[must_use]
    pub const fn stage(&self) -> Stage {
        match self {
            Self::Story(_) => Stage::Story,
            Self::Asset(_) => Stage::Asset,
            Self::Code(_) => Stage::Code,
            Self::Deploy(_) => Stage::Deploy,
        }
    }

    /// The raw JSON payload.
    #[must_use]
    pub fn payload(&self) -> &Value {
        match self {
            Self::Story(StoryOutput(v))
            | Self::Asset(AssetOutput(v))
            | Self::Code(CodeOutput(v))
            | Self::Deploy(DeployOutput(v)) => v,
        }
    }
}
