// Signing, validation and batching benchmarks for the IdLedger SDK.
//
// Covers raw signing per algorithm, document payload signature sets,
// authentication validation for growing key counts, and first-fit batch
// assembly at various sizes.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use idledger_sdk::auth::validate_authentication;
use idledger_sdk::crypto::{ed25519_multibase, sign_raw, SigningAlgorithm};
use idledger_sdk::identity::{Document, StaticResolver, VerificationMethod, VerificationMethodType};
use idledger_sdk::transaction::{
    assemble, DocumentPayload, Message, SignInput, SignerInputs, TransactionSigner,
};

const DID: &str = "did:idl:bench:alice";

fn document_with_keys(n: u8) -> (Document, Vec<SignInput>) {
    let mut doc = Document::new(DID);
    let mut inputs = Vec::new();
    for i in 0..n {
        let seed = [i.wrapping_add(1); 32];
        let pk = ed25519_dalek::SigningKey::from_bytes(&seed)
            .verifying_key()
            .to_bytes();
        let id = format!("{}#key-{}", DID, i);
        doc = doc
            .with_verification_method(VerificationMethod::new(
                id.clone(),
                VerificationMethodType::Ed25519VerificationKey2020,
                DID,
                ed25519_multibase(&pk),
            ))
            .with_authentication(id.clone());
        inputs.push(SignInput::new(id, seed.to_vec()));
    }
    (doc, inputs)
}

fn bench_sign_raw(c: &mut Criterion) {
    let message = b"idledger/document/v1 did:idl:bench:alice version=42";
    let mut group = c.benchmark_group("sign_raw");

    for algorithm in [
        SigningAlgorithm::Ed25519,
        SigningAlgorithm::Secp256k1,
        SigningAlgorithm::P256,
    ] {
        group.bench_function(format!("{:?}", algorithm), |b| {
            b.iter(|| sign_raw(algorithm, &[0x42; 32], message).unwrap());
        });
    }
    group.finish();
}

fn bench_sign_payload(c: &mut Criterion) {
    let signer = TransactionSigner::new();
    let mut group = c.benchmark_group("sign_payload");

    for keys in [1u8, 4, 16] {
        let (doc, inputs) = document_with_keys(keys);
        let payload = DocumentPayload::new(doc, "v1");
        group.throughput(Throughput::Elements(keys as u64));
        group.bench_with_input(BenchmarkId::from_parameter(keys), &inputs, |b, inputs| {
            b.iter(|| {
                signer
                    .sign_payload(&payload, SignerInputs::Keys(inputs.clone()))
                    .unwrap()
            });
        });
    }
    group.finish();
}

fn bench_validate_authentication(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    let signer = TransactionSigner::new();
    let resolver = StaticResolver::new();
    let mut group = c.benchmark_group("validate_authentication");

    for keys in [1u8, 8, 32] {
        let (doc, inputs) = document_with_keys(keys);
        let payload = DocumentPayload::new(doc.clone(), "v1");
        let signatures = signer
            .sign_payload(&payload, SignerInputs::Keys(inputs))
            .unwrap();

        group.throughput(Throughput::Elements(keys as u64));
        group.bench_with_input(BenchmarkId::from_parameter(keys), &signatures, |b, sigs| {
            b.iter(|| {
                runtime
                    .block_on(validate_authentication(&doc, sigs, &resolver, None))
                    .unwrap()
            });
        });
    }
    group.finish();
}

fn bench_assemble(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_assemble");

    for count in [10usize, 100, 1_000] {
        let messages: Vec<Message> = (0..count)
            .map(|i| Message::new("/idledger.did.v1.MsgUpdateDid", vec![i as u8; 64]))
            .collect();
        let estimates: Vec<u64> = (0..count as u64).map(|i| 50_000 + (i * 7_919) % 400_000).collect();

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &messages, |b, messages| {
            b.iter(|| assemble(messages.clone(), &estimates, 2_000_000));
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_sign_raw,
    bench_sign_payload,
    bench_validate_authentication,
    bench_assemble,
);
criterion_main!(benches);
