//! Domain models for the registry

pub mod certificate;
pub mod user;

pub use certificate::{
    parse_year, CandidateRecord, Certificate, CertificateFields, CertificatePatch,
    CertificatePatchInput, NewCertificate, YearValue,
};
pub use user::{Principal, Role, UserStatus};
