use glam::{Mat4, Quat, Vec3};

use crate::resource::{ActiveProgram, BindState, Error, Result, ShaderProgram};

/// Movement speed in world units per second.
pub const DEFAULT_SPEED: f32 = 2.0;

/// Speed multiplier while the boost input is held.
pub const BOOST_FACTOR: f32 = 4.0;

/// Degrees of rotation for a pointer sweep across the full viewport.
pub const DEFAULT_SENSITIVITY: f32 = 100.0;

/// Pitch limit in degrees, either side of the horizon.
pub const MAX_PITCH_DEGREES: f32 = 89.0;

/// Rotation requested for one frame, in degrees.
///
/// Positive yaw turns right, positive pitch looks up.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct LookDelta {
    pub yaw: f32,
    pub pitch: f32,
}

/// Snapshot of the controls that move the camera during one frame.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct CameraInput {
    pub forward: bool,
    pub back: bool,
    pub left: bool,
    pub right: bool,
    pub up: bool,
    pub down: bool,
    pub boost: bool,
    pub look: Option<LookDelta>,
}

/// Perspective parameters, passed per call rather than stored.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Projection {
    /// Vertical field of view in degrees.
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Projection {
    fn default() -> Self {
        Self {
            fov_degrees: 45.0,
            near: 0.1,
            far: 100.0,
        }
    }
}

impl Projection {
    pub fn validate(&self) -> Result<()> {
        let Projection {
            fov_degrees,
            near,
            far,
        } = *self;
        if !(fov_degrees.is_finite() && near.is_finite() && far.is_finite()) {
            return Err(Error::config(format!("non-finite projection {self:?}")));
        }
        if fov_degrees <= 0.0 || fov_degrees >= 180.0 {
            return Err(Error::config(format!(
                "field of view {fov_degrees} must be in (0, 180) degrees"
            )));
        }
        if near <= 0.0 {
            return Err(Error::config(format!("near plane {near} must be positive")));
        }
        if far <= near {
            return Err(Error::config(format!(
                "far plane {far} must be beyond near plane {near}"
            )));
        }
        Ok(())
    }
}

/// Free-flying perspective camera.
///
/// Keeps a position and an orthonormal forward/up/right basis. `right` always
/// lies in the horizontal plane, so the camera never rolls.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    position: Vec3,
    forward: Vec3,
    up: Vec3,
    right: Vec3,
    width: u32,
    height: u32,
    speed: f32,
    sensitivity: f32,
}

impl Camera {
    /// Camera at `position` looking down -Z with +Y up.
    pub fn new(width: u32, height: u32, position: Vec3) -> Result<Self> {
        check_viewport(width, height)?;
        if !position.is_finite() {
            return Err(Error::config(format!("non-finite camera position {position}")));
        }
        Ok(Self {
            position,
            forward: Vec3::NEG_Z,
            up: Vec3::Y,
            right: Vec3::X,
            width,
            height,
            speed: DEFAULT_SPEED,
            sensitivity: DEFAULT_SENSITIVITY,
        })
    }

    /// Applies one frame of movement and rotation.
    ///
    /// Displacement is `speed * boost * dt` along the combined directions, so
    /// movement does not depend on the frame rate.
    pub fn process_input(&mut self, input: &CameraInput, dt: f32) {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        let boost = if input.boost { BOOST_FACTOR } else { 1.0 };
        let step = self.speed * boost * dt;

        let mut direction = Vec3::ZERO;
        if input.forward {
            direction += self.forward;
        }
        if input.back {
            direction -= self.forward;
        }
        if input.right {
            direction += self.right;
        }
        if input.left {
            direction -= self.right;
        }
        if input.up {
            direction += Vec3::Y;
        }
        if input.down {
            direction -= Vec3::Y;
        }
        self.position += direction * step;

        if let Some(look) = input.look {
            self.rotate(look);
        }
    }

    /// Yaws around world up, then sets the pitch to the current angle plus
    /// `look.pitch`, clamped to ±`MAX_PITCH_DEGREES`, and rebuilds the basis.
    /// Forward is rebuilt from the clamped angle, not rotated by a delta.
    pub fn rotate(&mut self, look: LookDelta) {
        if !(look.yaw.is_finite() && look.pitch.is_finite()) {
            return;
        }

        let yaw = Quat::from_axis_angle(Vec3::Y, (-look.yaw).to_radians());
        // `right` is always horizontal.
        let right = (yaw * self.right).normalize();
        let heading = Vec3::Y.cross(right).normalize();

        let limit = MAX_PITCH_DEGREES.to_radians();
        let target = (pitch_radians(self.forward) + look.pitch.to_radians()).clamp(-limit, limit);

        self.forward = (heading * target.cos() + Vec3::Y * target.sin()).normalize();
        self.right = self.forward.cross(Vec3::Y).normalize();
        self.up = self.right.cross(self.forward).normalize();
    }

    /// Angle between forward and the horizon, in degrees.
    pub fn pitch(&self) -> f32 {
        pitch_radians(self.forward).to_degrees()
    }

    /// Converts a pointer movement in pixels into a rotation.
    pub fn look_from_pointer(&self, dx: f32, dy: f32) -> LookDelta {
        LookDelta {
            yaw: self.sensitivity * dx / self.width as f32,
            pitch: -self.sensitivity * dy / self.height as f32,
        }
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.forward, self.up)
    }

    /// Perspective projection for the current viewport (depth range 0..1).
    pub fn projection_matrix(&self, projection: &Projection) -> Result<Mat4> {
        projection.validate()?;
        Ok(Mat4::perspective_rh(
            projection.fov_degrees.to_radians(),
            self.aspect(),
            projection.near,
            projection.far,
        ))
    }

    pub fn view_projection_matrix(&self, projection: &Projection) -> Result<Mat4> {
        Ok(self.projection_matrix(projection)? * self.view_matrix())
    }

    /// Writes the view-projection matrix into the program's mat4 uniform `name`.
    pub fn publish(
        &self,
        program: &mut ShaderProgram,
        state: &BindState,
        active: &ActiveProgram,
        name: &str,
        projection: &Projection,
    ) -> Result<()> {
        let matrix = self.view_projection_matrix(projection)?;
        program.set_uniform_mat4(state, active, name, &matrix)
    }

    /// Updates the viewport after a window resize.
    pub fn set_viewport(&mut self, width: u32, height: u32) -> Result<()> {
        check_viewport(width, height)?;
        self.width = width;
        self.height = height;
        Ok(())
    }

    pub fn viewport(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    pub fn forward(&self) -> Vec3 {
        self.forward
    }

    pub fn up(&self) -> Vec3 {
        self.up
    }

    pub fn right(&self) -> Vec3 {
        self.right
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn set_speed(&mut self, speed: f32) {
        self.speed = speed;
    }

    pub fn set_sensitivity(&mut self, sensitivity: f32) {
        self.sensitivity = sensitivity;
    }
}

fn pitch_radians(forward: Vec3) -> f32 {
    forward.y.atan2(Vec3::new(forward.x, 0.0, forward.z).length())
}

fn check_viewport(width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        Err(Error::config(format!("viewport {width}x{height} has zero area")))
    } else {
        Ok(())
    }
}
