//! Voice and gesture interpretation.
//!
//! Voice transcripts are matched by case-insensitive substring. The model
//! command is a first-match chain (`red`, `blue`, `green`, then `spin`);
//! lighting keywords are checked independently so one utterance can do
//! both ("make it red and bright"). Among lighting keywords `normal` beats
//! `dark`, which beats `bright`.

use std::f32::consts::FRAC_PI_4;

use scenepulse_types::{GestureKind, VoiceCommand};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ModelCommand {
    Tint(u32),
    /// Rotate about the vertical axis by the given radians.
    Turn(f32),
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VoiceEffect {
    pub model: Option<ModelCommand>,
    pub light_intensity: Option<f32>,
}

const TINTS: [(&str, u32); 3] = [("red", 0xff0000), ("blue", 0x0000ff), ("green", 0x00ff00)];
/// Highest precedence first.
const LIGHTS: [(&str, f32); 3] = [("normal", 1.0), ("dark", 0.3), ("bright", 2.0)];

pub fn interpret_voice(command: &VoiceCommand) -> VoiceEffect {
    let model = TINTS
        .iter()
        .find(|(keyword, _)| command.contains_keyword(keyword))
        .map(|(_, color)| ModelCommand::Tint(*color))
        .or_else(|| {
            command
                .contains_keyword("spin")
                .then_some(ModelCommand::Turn(FRAC_PI_4))
        });
    let light_intensity = LIGHTS
        .iter()
        .find(|(keyword, _)| command.contains_keyword(keyword))
        .map(|(_, intensity)| *intensity);
    VoiceEffect {
        model,
        light_intensity,
    }
}

/// Scale and motion requested by the current gesture.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GestureEffect {
    pub target_scale: f32,
    pub spinning: bool,
}

pub fn interpret_gesture(kind: GestureKind) -> GestureEffect {
    GestureEffect {
        target_scale: if kind == GestureKind::ThumbsUp { 1.3 } else { 1.0 },
        spinning: kind == GestureKind::Peace,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voice(text: &str) -> VoiceEffect {
        interpret_voice(&VoiceCommand(text.to_string()))
    }

    #[test]
    fn colour_chain_takes_first_match() {
        assert_eq!(voice("RED please").model, Some(ModelCommand::Tint(0xff0000)));
        assert_eq!(voice("blue or green").model, Some(ModelCommand::Tint(0x0000ff)));
        assert_eq!(voice("spin it red").model, Some(ModelCommand::Tint(0xff0000)));
        assert_eq!(voice("spin").model, Some(ModelCommand::Turn(FRAC_PI_4)));
        assert_eq!(voice("hello").model, None);
    }

    #[test]
    fn lighting_is_independent_of_model_command() {
        let effect = voice("green and Bright");
        assert_eq!(effect.model, Some(ModelCommand::Tint(0x00ff00)));
        assert_eq!(effect.light_intensity, Some(2.0));
        assert_eq!(voice("too dark").light_intensity, Some(0.3));
        assert_eq!(voice("back to normal").light_intensity, Some(1.0));
        assert_eq!(voice("red").light_intensity, None);
    }

    #[test]
    fn later_lighting_keywords_take_precedence() {
        assert_eq!(voice("bright, no, dark").light_intensity, Some(0.3));
        assert_eq!(voice("dark then bright").light_intensity, Some(0.3));
        assert_eq!(voice("bright and dark, back to normal").light_intensity, Some(1.0));
    }

    #[test]
    fn gestures_map_to_scale_and_spin() {
        assert_eq!(
            interpret_gesture(GestureKind::ThumbsUp),
            GestureEffect {
                target_scale: 1.3,
                spinning: false
            }
        );
        assert!(interpret_gesture(GestureKind::Peace).spinning);
        assert_eq!(interpret_gesture(GestureKind::None).target_scale, 1.0);
        assert_eq!(interpret_gesture(GestureKind::Unknown).target_scale, 1.0);
    }
}
