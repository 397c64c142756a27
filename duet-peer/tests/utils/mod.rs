
pub use call_harness::*;
pub use mock_media::*;
pub use mock_transport::*;
pub use rtc_factory::*;
