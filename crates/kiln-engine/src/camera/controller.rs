use crate::input::{InputFrame, InputState, Key, MouseButton};

use super::view::{Camera, CameraInput};

/// Maps held keys and pointer motion to a [`CameraInput`].
///
/// W/S move along the view direction, A/D strafe, Space/Control rise and sink,
/// Shift boosts. Dragging with the look button held rotates the view; the
/// frame the button goes down only starts the drag.
#[derive(Debug, Clone)]
pub struct CameraController {
    look_button: MouseButton,
    looking: bool,
}

impl Default for CameraController {
    fn default() -> Self {
        Self::new(MouseButton::Left)
    }
}

impl CameraController {
    pub fn new(look_button: MouseButton) -> Self {
        Self {
            look_button,
            looking: false,
        }
    }

    /// True while the look button is held; the cursor should be hidden then.
    pub fn is_looking(&self) -> bool {
        self.looking
    }

    pub fn input(&mut self, camera: &Camera, state: &InputState, frame: &InputFrame) -> CameraInput {
        let was_looking = self.looking;
        self.looking = state.button_down(self.look_button);

        let (dx, dy) = frame.pointer_delta;
        let look = (was_looking && self.looking && (dx != 0.0 || dy != 0.0))
            .then(|| camera.look_from_pointer(dx, dy));

        CameraInput {
            forward: state.key_down(Key::W),
            back: state.key_down(Key::S),
            left: state.key_down(Key::A),
            right: state.key_down(Key::D),
            up: state.key_down(Key::Space),
            down: state.key_down(Key::Control),
            boost: state.key_down(Key::Shift),
            look,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{InputEvent, KeyState, Modifiers, MouseButtonState, PointerButtonEvent, PointerMoveEvent};
    use glam::Vec3;

    fn key(state: &mut InputState, frame: &mut InputFrame, key: Key) {
        state.apply_event(
            frame,
            InputEvent::Key {
                key,
                state: KeyState::Pressed,
                modifiers: Modifiers::default(),
                code: 0,
                repeat: false,
            },
        );
    }

    fn button(state: &mut InputState, frame: &mut InputFrame, pressed: bool) {
        let (x, y) = state.pointer_pos.unwrap_or((0.0, 0.0));
        state.apply_event(
            frame,
            InputEvent::PointerButton(PointerButtonEvent {
                button: MouseButton::Left,
                state: if pressed { MouseButtonState::Pressed } else { MouseButtonState::Released },
                x,
                y,
                modifiers: Modifiers::default(),
            }),
        );
    }

    fn move_to(state: &mut InputState, frame: &mut InputFrame, x: f32, y: f32) {
        state.apply_event(frame, InputEvent::PointerMoved(PointerMoveEvent { x, y }));
    }

    #[test]
    fn held_keys_map_to_directions() {
        let camera = Camera::new(800, 600, Vec3::ZERO).unwrap();
        let mut state = InputState::default();
        let mut frame = InputFrame::default();
        key(&mut state, &mut frame, Key::W);
        key(&mut state, &mut frame, Key::D);
        key(&mut state, &mut frame, Key::Shift);

        let input = CameraController::default().input(&camera, &state, &frame);
        assert!(input.forward && input.right && input.boost);
        assert!(!input.back && !input.left && !input.up && !input.down);
        assert_eq!(input.look, None);
    }

    #[test]
    fn drag_rotates_after_the_press_frame() {
        let camera = Camera::new(800, 600, Vec3::ZERO).unwrap();
        let mut controller = CameraController::default();
        let mut state = InputState::default();
        let mut frame = InputFrame::default();

        move_to(&mut state, &mut frame, 400.0, 300.0);
        button(&mut state, &mut frame, true);
        move_to(&mut state, &mut frame, 420.0, 300.0);
        let first = controller.input(&camera, &state, &frame);
        assert_eq!(first.look, None);
        assert!(controller.is_looking());
        frame.clear();

        move_to(&mut state, &mut frame, 440.0, 290.0);
        let second = controller.input(&camera, &state, &frame);
        let look = second.look.expect("drag should produce a rotation");
        assert!(look.yaw > 0.0);
        assert!(look.pitch > 0.0);
        frame.clear();

        button(&mut state, &mut frame, false);
        move_to(&mut state, &mut frame, 500.0, 290.0);
        assert_eq!(controller.input(&camera, &state, &frame).look, None);
        assert!(!controller.is_looking());
    }
}
