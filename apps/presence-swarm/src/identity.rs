use presence_client::ClientIdentity;
use rand::Rng;

/// Client profiles a simulated viewer may present as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserProfile {
    Chrome,
    Firefox,
    Edge,
}

impl BrowserProfile {
    pub const ALL: [BrowserProfile; 3] = [
        BrowserProfile::Chrome,
        BrowserProfile::Firefox,
        BrowserProfile::Edge,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BrowserProfile::Chrome => "chrome",
            BrowserProfile::Firefox => "firefox",
            BrowserProfile::Edge => "edge",
        }
    }

    pub fn identity(self) -> ClientIdentity {
        ClientIdentity::new(format!(
            "presence-swarm/{} (profile={})",
            env!("CARGO_PKG_VERSION"),
            self.as_str()
        ))
    }
}

/// Produces a client identity for each worker iteration.
pub trait IdentityProvider: Send + Sync {
    fn next_identity(&self) -> ClientIdentity;
}

/// Picks a profile uniformly at random on every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProfileRotation;

impl ProfileRotation {
    pub fn new() -> Self {
        ProfileRotation
    }

    pub fn pick<R: Rng + ?Sized>(rng: &mut R) -> BrowserProfile {
        BrowserProfile::ALL[rng.gen_range(0..BrowserProfile::ALL.len())]
    }
}

impl IdentityProvider for ProfileRotation {
    fn next_identity(&self) -> ClientIdentity {
        Self::pick(&mut rand::thread_rng()).identity()
    }
}
