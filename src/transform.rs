use glam::{Mat4, Vec3};

/// Stack of model matrices. Operations post-multiply the top entry so that
/// the last applied operation is the first one seen by a vertex.
#[derive(Debug, Clone)]
pub struct MatrixStack {
    top: Mat4,
    saved: Vec<Mat4>,
}

impl Default for MatrixStack {
    fn default() -> Self {
        Self::new()
    }
}

impl MatrixStack {
    pub fn new() -> Self {
        Self {
            top: Mat4::IDENTITY,
            saved: Vec::new(),
        }
    }

    /// Number of scopes currently pushed.
    pub fn depth(&self) -> usize {
        self.saved.len()
    }

    pub fn top(&self) -> Mat4 {
        self.top
    }

    pub fn push(&mut self) {
        self.saved.push(self.top);
    }

    /// Restores the matrix saved by the matching [`push`](Self::push).
    /// Popping an empty stack resets the top to identity.
    pub fn pop(&mut self) {
        self.top = self.saved.pop().unwrap_or(Mat4::IDENTITY);
    }

    /// Runs `body` inside a push/pop pair and returns its result.
    pub fn scope<R>(&mut self, body: impl FnOnce(&mut Self) -> R) -> R {
        self.push();
        let result = body(self);
        self.pop();
        result
    }

    pub fn translate(&mut self, offset: Vec3) -> &mut Self {
        self.top *= Mat4::from_translation(offset);
        self
    }

    pub fn rotate_deg(&mut self, angle: f32, axis: Vec3) -> &mut Self {
        self.top *= Mat4::from_axis_angle(axis.normalize_or_zero(), angle.to_radians());
        self
    }

    pub fn scale(&mut self, factor: Vec3) -> &mut Self {
        self.top *= Mat4::from_scale(factor);
        self
    }

    pub fn apply(&mut self, op: &TransformOp) -> &mut Self {
        match *op {
            TransformOp::Translate(offset) => self.translate(offset),
            TransformOp::RotateDeg { angle, axis } => self.rotate_deg(angle, axis),
            TransformOp::Scale(factor) => self.scale(factor),
        }
    }
}

/// One step of an object's fixed placement sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransformOp {
    Translate(Vec3),
    RotateDeg { angle: f32, axis: Vec3 },
    Scale(Vec3),
}
