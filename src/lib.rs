pub mod attachments;
pub mod body;
pub mod environment;
pub mod error;
pub mod forces;
pub mod input;
pub mod kinematics;
pub mod mass;
pub mod model;
pub mod output;
pub mod util;

pub use attachments::{PointAttachment, PointLoad, RodAttachment, RodLoad};
pub use body::{Body, BodyProperties, BodyType, StepPhase};
pub use environment::{Environment, FlowField, FlowKinematics, StillWater, UniformCurrent};
pub use error::{BodyError, Status};
pub use kinematics::{PointKinematics, RigidKinematics, RodKinematics};
pub use model::Model;
