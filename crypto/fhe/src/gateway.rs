//! Decryption Gateway
//!
//! Asynchronous decryption in two phases:
//! 1. `request_decryption` queues ciphertexts and hands back an opaque
//!    [`RequestId`] immediately
//! 2. A relayer later calls [`DecryptionGateway::fulfill_next`], which decrypts
//!    with the key holder, encodes the plaintexts and signs
//!    `(request id, payload)` with the gateway's Ed25519 key
//!
//! The signature is the proof a callback must present. It binds the plaintext
//! to one specific request id, so a payload answered for one request cannot be
//! replayed against another.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use parking_lot::Mutex;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use serde_big_array::BigArray;
use tracing::debug;

use crate::backend::Decryptor;
use crate::{FHEError, FHEResult};

/// Domain separation tag for decryption proofs
const DST_DECRYPTION: &[u8] = b"CENSUS_DECRYPTION_PROOF_V1";

/// Size of one plaintext word in a payload
const WORD_BYTES: usize = 8;

/// Opaque identifier of a pending decryption request.
///
/// Ids issued by a gateway start at 1; 0 is never issued.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RequestId(pub u64);

impl RequestId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Signature over `(request id, payload)`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptionProof {
    #[serde(with = "BigArray")]
    signature: [u8; 64],
}

impl DecryptionProof {
    pub fn from_bytes(signature: [u8; 64]) -> Self {
        Self { signature }
    }

    pub fn to_bytes(&self) -> [u8; 64] {
        self.signature
    }
}

/// Encode plaintext words as a little-endian payload
pub fn encode_payload(values: &[u64]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Decode a payload of exactly `words` little-endian words
pub fn decode_payload(payload: &[u8], words: usize) -> FHEResult<Vec<u64>> {
    let expected = words * WORD_BYTES;
    if payload.len() != expected {
        return Err(FHEError::MalformedPayload {
            expected,
            got: payload.len(),
        });
    }

    Ok(payload
        .chunks_exact(WORD_BYTES)
        .map(|chunk| {
            let mut word = [0u8; WORD_BYTES];
            word.copy_from_slice(chunk);
            u64::from_le_bytes(word)
        })
        .collect())
}

fn proof_message(request_id: RequestId, payload: &[u8]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(DST_DECRYPTION);
    hasher.update(&request_id.0.to_le_bytes());
    hasher.update(payload);
    *hasher.finalize().as_bytes()
}

/// Decryption capability consumed by the ledger
pub trait DecryptionOracle<C>: Send + Sync {
    /// Queue ciphertexts for decryption and return the correlation token
    fn request_decryption(&self, ciphertexts: Vec<C>) -> FHEResult<RequestId>;

    /// Check that `proof` answers `request_id` with exactly `payload`
    fn verify_proof(&self, request_id: RequestId, payload: &[u8], proof: &DecryptionProof) -> bool;

    /// Drop a queued request before it is fulfilled. Returns whether it was queued.
    fn cancel_request(&self, request_id: RequestId) -> bool;
}

impl<C, T: DecryptionOracle<C> + ?Sized> DecryptionOracle<C> for Arc<T> {
    fn request_decryption(&self, ciphertexts: Vec<C>) -> FHEResult<RequestId> {
        (**self).request_decryption(ciphertexts)
    }

    fn verify_proof(&self, request_id: RequestId, payload: &[u8], proof: &DecryptionProof) -> bool {
        (**self).verify_proof(request_id, payload, proof)
    }

    fn cancel_request(&self, request_id: RequestId) -> bool {
        (**self).cancel_request(request_id)
    }
}

/// Verifies gateway proofs without access to the signing key
#[derive(Clone, Debug)]
pub struct ProofVerifier {
    key: VerifyingKey,
}

impl ProofVerifier {
    pub fn new(key: VerifyingKey) -> Self {
        Self { key }
    }

    pub fn from_bytes(bytes: &[u8; 32]) -> FHEResult<Self> {
        let key = VerifyingKey::from_bytes(bytes).map_err(|e| FHEError::InvalidKey(e.to_string()))?;
        Ok(Self { key })
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.key.to_bytes()
    }

    pub fn verify(&self, request_id: RequestId, payload: &[u8], proof: &DecryptionProof) -> bool {
        let message = proof_message(request_id, payload);
        let signature = Signature::from_bytes(&proof.signature);
        self.key.verify(&message, &signature).is_ok()
    }
}

/// A queued decryption request
#[derive(Clone, Debug)]
pub struct DecryptionRequest<C> {
    pub id: RequestId,
    pub ciphertexts: Vec<C>,
}

/// The gateway's answer, delivered to the ledger callback
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DecryptionResponse {
    pub request_id: RequestId,
    pub payload: Vec<u8>,
    pub proof: DecryptionProof,
}

/// Key-holding decryption gateway
pub struct DecryptionGateway<D: Decryptor> {
    decryptor: D,
    signing_key: SigningKey,
    next_id: AtomicU64,
    queue: Mutex<VecDeque<DecryptionRequest<D::Ciphertext>>>,
}

impl<D: Decryptor> DecryptionGateway<D> {
    /// Create a gateway with a given signing key
    pub fn new(decryptor: D, signing_key: SigningKey) -> Self {
        Self {
            decryptor,
            signing_key,
            next_id: AtomicU64::new(1),
            queue: Mutex::new(VecDeque::new()),
        }
    }

    /// Create a gateway with a fresh random signing key
    pub fn generate(decryptor: D) -> Self {
        Self::new(decryptor, SigningKey::generate(&mut OsRng))
    }

    /// Restore a gateway from a persisted 32-byte key seed
    pub fn from_seed(decryptor: D, seed: &[u8; 32]) -> Self {
        Self::new(decryptor, SigningKey::from_bytes(seed))
    }

    /// Key seed for persistence
    pub fn seed(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    /// Continue issuing request ids from `next_id` (e.g. after a restart)
    pub fn with_next_id(self, next_id: u64) -> Self {
        self.next_id.store(next_id.max(1), Ordering::SeqCst);
        self
    }

    /// Verifier for this gateway's proofs
    pub fn verifier(&self) -> ProofVerifier {
        ProofVerifier::new(self.signing_key.verifying_key())
    }

    /// Number of requests waiting for fulfilment
    pub fn queued(&self) -> usize {
        self.queue.lock().len()
    }

    /// Sign a payload for a request id
    pub fn sign(&self, request_id: RequestId, payload: &[u8]) -> DecryptionProof {
        let message = proof_message(request_id, payload);
        DecryptionProof {
            signature: self.signing_key.sign(&message).to_bytes(),
        }
    }

    /// Decrypt and sign the oldest queued request
    pub fn fulfill_next(&self) -> FHEResult<Option<DecryptionResponse>> {
        let request = match self.queue.lock().pop_front() {
            Some(request) => request,
            None => return Ok(None),
        };

        let values = request
            .ciphertexts
            .iter()
            .map(|ct| self.decryptor.decrypt(ct))
            .collect::<FHEResult<Vec<u64>>>()?;

        let payload = encode_payload(&values);
        let proof = self.sign(request.id, &payload);

        debug!("Fulfilled decryption request {} ({} values)", request.id, values.len());

        Ok(Some(DecryptionResponse {
            request_id: request.id,
            payload,
            proof,
        }))
    }

    /// Drain the whole queue
    pub fn fulfill_all(&self) -> FHEResult<Vec<DecryptionResponse>> {
        let mut responses = Vec::new();
        while let Some(response) = self.fulfill_next()? {
            responses.push(response);
        }
        Ok(responses)
    }
}

impl<D: Decryptor> DecryptionOracle<D::Ciphertext> for DecryptionGateway<D> {
    fn request_decryption(&self, ciphertexts: Vec<D::Ciphertext>) -> FHEResult<RequestId> {
        if ciphertexts.is_empty() {
            return Err(FHEError::RequestRejected("No ciphertexts to decrypt".into()));
        }

        let id = RequestId(self.next_id.fetch_add(1, Ordering::SeqCst));
        debug!("Queued decryption request {} ({} ciphertexts)", id, ciphertexts.len());
        self.queue.lock().push_back(DecryptionRequest { id, ciphertexts });
        Ok(id)
    }

    fn verify_proof(&self, request_id: RequestId, payload: &[u8], proof: &DecryptionProof) -> bool {
        self.verifier().verify(request_id, payload, proof)
    }

    fn cancel_request(&self, request_id: RequestId) -> bool {
        let mut queue = self.queue.lock();
        let before = queue.len();
        queue.retain(|request| request.id != request_id);
        before != queue.len()
    }
}

impl<D: Decryptor> fmt::Debug for DecryptionGateway<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecryptionGateway")
            .field("key", &hex::encode(&self.signing_key.verifying_key().to_bytes()[..8]))
            .field("next_id", &self.next_id.load(Ordering::SeqCst))
            .field("queued", &self.queued())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plain::{PlainBackend, PlainCiphertext};

    fn gateway() -> DecryptionGateway<PlainBackend> {
        DecryptionGateway::generate(PlainBackend::new())
    }

    #[test]
    fn test_request_ids_start_at_one() {
        let gw = gateway();
        let a = gw.request_decryption(vec![PlainCiphertext(1)]).unwrap();
        let b = gw.request_decryption(vec![PlainCiphertext(2)]).unwrap();
        assert_eq!(a, RequestId(1));
        assert_eq!(b, RequestId(2));
        assert_eq!(gw.queued(), 2);
    }

    #[test]
    fn test_fulfilled_proof_verifies() {
        let gw = gateway();
        let id = gw
            .request_decryption(vec![PlainCiphertext(36), PlainCiphertext(2), PlainCiphertext(50)])
            .unwrap();

        let response = gw.fulfill_next().unwrap().unwrap();
        assert_eq!(response.request_id, id);
        assert_eq!(decode_payload(&response.payload, 3).unwrap(), vec![36, 2, 50]);
        assert!(gw.verify_proof(id, &response.payload, &response.proof));
        assert!(gw.fulfill_next().unwrap().is_none());
    }

    #[test]
    fn test_proof_is_bound_to_request_and_payload() {
        let gw = gateway();
        let payload = encode_payload(&[1, 2, 3]);
        let proof = gw.sign(RequestId(7), &payload);

        assert!(gw.verify_proof(RequestId(7), &payload, &proof));
        assert!(!gw.verify_proof(RequestId(8), &payload, &proof));
        assert!(!gw.verify_proof(RequestId(7), &encode_payload(&[1, 2, 4]), &proof));
    }

    #[test]
    fn test_foreign_gateway_proof_rejected() {
        let gw = gateway();
        let other = gateway();
        let payload = encode_payload(&[9]);
        let forged = other.sign(RequestId(1), &payload);
        assert!(!gw.verify_proof(RequestId(1), &payload, &forged));
    }

    #[test]
    fn test_decode_rejects_wrong_length() {
        assert!(matches!(
            decode_payload(&[0u8; 23], 3),
            Err(FHEError::MalformedPayload { expected: 24, got: 23 })
        ));
    }

    #[test]
    fn test_empty_request_rejected() {
        let gw = gateway();
        assert!(gw.request_decryption(Vec::new()).is_err());
    }

    #[test]
    fn test_restored_gateway_signs_identically() {
        let gw = gateway().with_next_id(5);
        let restored = DecryptionGateway::from_seed(PlainBackend::new(), &gw.seed());
        let payload = encode_payload(&[11, 12, 13]);

        assert_eq!(gw.sign(RequestId(5), &payload), restored.sign(RequestId(5), &payload));
        assert_eq!(gw.verifier().to_bytes(), restored.verifier().to_bytes());
    }

    #[test]
    fn test_cancel_request() {
        let gw = gateway();
        let a = gw.request_decryption(vec![PlainCiphertext(1)]).unwrap();
        let b = gw.request_decryption(vec![PlainCiphertext(2)]).unwrap();

        assert!(gw.cancel_request(a));
        assert!(!gw.cancel_request(a));
        assert_eq!(gw.queued(), 1);
        assert_eq!(gw.fulfill_next().unwrap().unwrap().request_id, b);
    }

    #[test]
    fn test_verifier_roundtrip_bytes() {
        let gw = gateway();
        let verifier = ProofVerifier::from_bytes(&gw.verifier().to_bytes()).unwrap();
        let payload = encode_payload(&[5]);
        let proof = gw.sign(RequestId(3), &payload);
        assert!(verifier.verify(RequestId(3), &payload, &proof));
    }
}
