//! Screen rotation cycle
//!
//! Each rotation turns the screen a quarter counter-clockwise through
//! normal → right → inverted → left and rebinds the four d-pad keycodes so
//! the arrows keep pointing the way they are drawn.

use crate::shell::Orientation;

const ORIENTATIONS: [Orientation; 4] = [
    Orientation::Normal,
    Orientation::Left,
    Orientation::Inverted,
    Orientation::Right,
];

/// Keypad keycodes in clockwise order starting at "up"
const DPAD_KEYCODES: [u32; 4] = [80, 85, 88, 83];

const DPAD_KEYSYMS: [&str; 4] = ["KP_Up", "KP_Right", "KP_Down", "KP_Left"];

/// What a rotation asks the display tools to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationStep {
    pub orientation: Orientation,
    /// keycode → keysym for the new orientation
    pub mappings: [(u32, &'static str); 4],
}

/// Current position in the rotation cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rotation {
    index: usize,
}

impl Rotation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn orientation(&self) -> Orientation {
        ORIENTATIONS[self.index]
    }

    /// Advance one quarter turn and describe the resulting configuration
    pub fn rotate(&mut self) -> RotationStep {
        self.index = (self.index + ORIENTATIONS.len() - 1) % ORIENTATIONS.len();
        RotationStep {
            orientation: self.orientation(),
            mappings: dpad_mappings(self.index),
        }
    }
}

fn dpad_mappings(index: usize) -> [(u32, &'static str); 4] {
    std::array::from_fn(|i| (DPAD_KEYCODES[(index + i) % DPAD_KEYCODES.len()], DPAD_KEYSYMS[i]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_order() {
        let mut rotation = Rotation::new();
        assert_eq!(rotation.orientation(), Orientation::Normal);

        let order: Vec<_> = (0..4).map(|_| rotation.rotate().orientation).collect();
        assert_eq!(
            order,
            vec![
                Orientation::Right,
                Orientation::Inverted,
                Orientation::Left,
                Orientation::Normal
            ]
        );
    }

    #[test]
    fn test_four_rotations_return_to_start() {
        let mut rotation = Rotation::new();
        let start = rotation;
        for _ in 0..4 {
            rotation.rotate();
        }
        assert_eq!(rotation, start);
    }

    #[test]
    fn test_first_rotation_mappings() {
        let mut rotation = Rotation::new();
        let step = rotation.rotate();
        assert_eq!(
            step.mappings,
            [(83, "KP_Up"), (80, "KP_Right"), (85, "KP_Down"), (88, "KP_Left")]
        );
    }

    #[test]
    fn test_mappings_follow_index() {
        assert_eq!(
            dpad_mappings(0),
            [(80, "KP_Up"), (85, "KP_Right"), (88, "KP_Down"), (83, "KP_Left")]
        );

        // Every keycode gets exactly one keysym in every orientation
        for index in 0..4 {
            let mut codes: Vec<u32> = dpad_mappings(index).iter().map(|(code, _)| *code).collect();
            codes.sort_unstable();
            assert_eq!(codes, vec![80, 83, 85, 88]);
        }

        // Successive orientations shift the keycodes by one position
        for index in 0..4 {
            let here = dpad_mappings(index);
            let next = dpad_mappings((index + 1) % 4);
            for i in 0..4 {
                assert_eq!(next[i].0, here[(i + 1) % 4].0);
            }
        }
    }
}
