//! End-to-end tests over the public library API.

mod mock_roster;
mod session_flow;
