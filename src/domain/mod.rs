/// Domain value objects shared by the resources
pub mod coord;
pub mod daterange;
pub mod instrument;
pub mod mission_time;
pub mod obsid;
pub mod status;
pub mod time;
pub mod tle;

pub use coord::{Angle, AngleUnit, SkyPosition, DEFAULT_RADIUS_DEG};
pub use daterange::{DateRange, ResolvedRange};
pub use instrument::Instrument;
pub use mission_time::{MissionTime, TimeBase};
pub use obsid::ObsId;
pub use status::{JobState, Status};
pub use time::TimeInput;
pub use tle::TleEntry;
