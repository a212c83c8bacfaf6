mod challenge_store;
mod github;
mod metrics;
mod models;
mod passkey;
mod repository;

// Publicly expose the Metrics abstraction
pub use metrics::{AuthMethod, Metrics, MetricsPtr};

// Persistence abstractions and the records they hold
pub use challenge_store::{ChallengeStore, ChallengeStorePtr};
pub use models::{
    Credential, LinkedIdentity, NewIdentityOutcome, ProviderProfile, TokenKind, User,
    VerificationToken,
};
pub use repository::{Repository, RepositoryPtr};

// External protocol seams
pub use github::{GitHubApi, GitHubApiPtr, GitHubEmail, GitHubUser, ProviderError};
pub use passkey::{
    CeremonyChallenge, PasskeyVerifier, PasskeyVerifierPtr, RegisteredPasskey, VerifiedAssertion,
};
