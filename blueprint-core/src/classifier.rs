use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::BlueprintError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Blueprint,
    Material,
    Animation,
    BehaviorTree,
    Metasound,
    Niagara,
    #[serde(rename = "pcg")]
    PcgGraph,
    ControlRig,
}

/// Marker substrings checked in order; the first hit decides the kind.
const MARKERS: &[(&str, DocumentKind)] = &[
    ("/Script/MetasoundEditor", DocumentKind::Metasound),
    ("/Script/PCGEditor", DocumentKind::PcgGraph),
    ("/Script/NiagaraEditor", DocumentKind::Niagara),
    ("/Script/ControlRigDeveloper", DocumentKind::ControlRig),
    ("/Script/BehaviorTreeEditor", DocumentKind::BehaviorTree),
    ("/Script/AnimGraph", DocumentKind::Animation),
    ("/Script/UnrealEd.MaterialGraphNode", DocumentKind::Material),
];

/// Classify submitted text by scanning for engine-specific tokens.
pub fn classify(content: &str) -> DocumentKind {
    MARKERS
        .iter()
        .find(|(marker, _)| content.contains(marker))
        .map(|(_, kind)| *kind)
        .unwrap_or(DocumentKind::Blueprint)
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Blueprint => "blueprint",
            DocumentKind::Material => "material",
            DocumentKind::Animation => "animation",
            DocumentKind::BehaviorTree => "behavior_tree",
            DocumentKind::Metasound => "metasound",
            DocumentKind::Niagara => "niagara",
            DocumentKind::PcgGraph => "pcg",
            DocumentKind::ControlRig => "control_rig",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentKind {
    type Err = BlueprintError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "blueprint" => Ok(DocumentKind::Blueprint),
            "material" => Ok(DocumentKind::Material),
            "animation" => Ok(DocumentKind::Animation),
            "behavior_tree" => Ok(DocumentKind::BehaviorTree),
            "metasound" => Ok(DocumentKind::Metasound),
            "niagara" => Ok(DocumentKind::Niagara),
            "pcg" => Ok(DocumentKind::PcgGraph),
            "control_rig" => Ok(DocumentKind::ControlRig),
            other => Err(BlueprintError::InvalidRequest(format!(
                "unknown document kind: {}",
                other
            ))),
        }
    }
}
