//! gpgfolder - archive a folder and encrypt it with a gpg passphrase, or
//! decrypt such an archive and extract it again

#![forbid(unsafe_code)]

pub mod archive;
pub mod config;
pub mod error;
pub mod gpg;
pub mod naming;
pub mod operator;
pub mod passphrase;
pub mod pipeline;
pub mod selection;
pub mod session;
