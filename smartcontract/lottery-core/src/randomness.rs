// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Commit-reveal randomness for winner selection.
//!
//! A round publishes `sha256(COMMIT_DOMAIN || secret)` when it opens. The secret
//! is revealed by the committer in a separate step after the round has closed,
//! and the engine refuses any secret that does not hash to the published
//! commitment. Bettors never know the secret while betting and the committer
//! cannot swap it once bets exist. Committers may not bet, and the draw seed
//! also covers the final bet set.

use std::fmt;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::RoundId;

const COMMIT_DOMAIN: &[u8] = b"token-lottery/commit";
const BEACON_DOMAIN: &[u8] = b"token-lottery/beacon";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RandomnessError {
    #[error("Invalid hex: {0}")]
    InvalidHex(String),

    #[error("Expected 32 bytes, got {0}")]
    InvalidLength(usize),

    #[error("No commitment supplied for round {0}")]
    NoCommitment(RoundId),

    #[error("Secret for round {0} was not revealed")]
    NotRevealed(RoundId),

    #[error("Revealed secret does not match the commitment of round {0}")]
    Mismatch(RoundId),
}

fn decode_32(input: &str) -> Result<[u8; 32], RandomnessError> {
    let bytes = hex::decode(input.trim_start_matches("0x"))
        .map_err(|e| RandomnessError::InvalidHex(e.to_string()))?;
    let len = bytes.len();
    bytes.try_into().map_err(|_| RandomnessError::InvalidLength(len))
}

/// Published hash of a round's secret.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Commitment([u8; 32]);

impl Commitment {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Commitment(bytes)
    }

    pub fn from_hex(input: &str) -> Result<Self, RandomnessError> {
        decode_32(input).map(Commitment::from_bytes)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Commitment({})", self.to_hex())
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for Commitment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Commitment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        Commitment::from_hex(&encoded).map_err(de::Error::custom)
    }
}

/// The value behind a commitment. Kept off the public state until the draw.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret([u8; 32]);

impl Secret {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Secret(bytes)
    }

    pub fn from_hex(input: &str) -> Result<Self, RandomnessError> {
        decode_32(input).map(Secret)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn commitment(&self) -> Commitment {
        let mut hasher = Sha256::new();
        hasher.update(COMMIT_DOMAIN);
        hasher.update(self.0);
        Commitment::from_bytes(hasher.finalize().into())
    }

    pub fn verify(&self, round_id: RoundId, commitment: &Commitment) -> Result<(), RandomnessError> {
        if self.commitment() == *commitment {
            Ok(())
        } else {
            Err(RandomnessError::Mismatch(round_id))
        }
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(..)")
    }
}

/// Where the engine gets commitments and, at reveal time, the matching secrets.
pub trait RandomnessSource {
    fn commit(&mut self, round_id: RoundId) -> Result<Commitment, RandomnessError>;

    fn reveal(&mut self, round_id: RoundId) -> Result<Secret, RandomnessError>;
}

impl<R: RandomnessSource + ?Sized> RandomnessSource for &mut R {
    fn commit(&mut self, round_id: RoundId) -> Result<Commitment, RandomnessError> {
        (**self).commit(round_id)
    }

    fn reveal(&mut self, round_id: RoundId) -> Result<Secret, RandomnessError> {
        (**self).reveal(round_id)
    }
}

impl<R: RandomnessSource + ?Sized> RandomnessSource for Box<R> {
    fn commit(&mut self, round_id: RoundId) -> Result<Commitment, RandomnessError> {
        (**self).commit(round_id)
    }

    fn reveal(&mut self, round_id: RoundId) -> Result<Secret, RandomnessError> {
        (**self).reveal(round_id)
    }
}

/// Derives one secret per round from an operator-held master seed.
///
/// Suitable for a host process that keeps the seed private; the master seed
/// must never be stored next to the engine state.
pub struct SecretBeacon {
    master: [u8; 32],
}

impl SecretBeacon {
    pub fn new(master: [u8; 32]) -> Self {
        SecretBeacon { master }
    }

    pub fn secret_for(&self, round_id: RoundId) -> Secret {
        let mut hasher = Sha256::new();
        hasher.update(BEACON_DOMAIN);
        hasher.update(self.master);
        hasher.update(round_id.to_be_bytes());
        Secret(hasher.finalize().into())
    }
}

impl RandomnessSource for SecretBeacon {
    fn commit(&mut self, round_id: RoundId) -> Result<Commitment, RandomnessError> {
        Ok(self.secret_for(round_id).commitment())
    }

    fn reveal(&mut self, round_id: RoundId) -> Result<Secret, RandomnessError> {
        Ok(self.secret_for(round_id))
    }
}

/// One-shot source carrying whatever the current caller supplied.
///
/// Used where state is public: the operator passes the commitment when opening
/// and the secret in a later reveal call. A reveal without a secret fails and
/// leaves the round waiting.
#[derive(Debug, Default)]
pub struct OperatorReveal {
    commitment: Option<Commitment>,
    secret: Option<Secret>,
}

impl OperatorReveal {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn committing(commitment: Commitment) -> Self {
        OperatorReveal {
            commitment: Some(commitment),
            secret: None,
        }
    }

    pub fn revealing(secret: Option<Secret>) -> Self {
        OperatorReveal {
            commitment: None,
            secret,
        }
    }
}

impl RandomnessSource for OperatorReveal {
    fn commit(&mut self, round_id: RoundId) -> Result<Commitment, RandomnessError> {
        self.commitment.take().ok_or(RandomnessError::NoCommitment(round_id))
    }

    fn reveal(&mut self, round_id: RoundId) -> Result<Secret, RandomnessError> {
        self.secret.take().ok_or(RandomnessError::NotRevealed(round_id))
    }
}
