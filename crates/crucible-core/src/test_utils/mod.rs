pub mod mock_sandbox_server;

pub use mock_sandbox_server::MockSandboxServer;
