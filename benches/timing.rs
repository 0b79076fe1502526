use std::hint::black_box;
use std::time::Instant;

use daybook::cipher;
use daybook::kdf::{self, CipherKeys, KdfParams, SALT_BYTES};

fn time_it<F: FnMut()>(label: &str, iters: usize, mut f: F) {
    // warmup
    for _ in 0..(iters / 10).max(10) {
        f();
    }

    let start = Instant::now();
    for _ in 0..iters {
        f();
    }
    let elapsed = start.elapsed();

    let per_iter = elapsed / (iters as u32);
    println!("{:<20} total={:?}  per_iter={:?}", label, elapsed, per_iter);
}

fn main() {
    let params = KdfParams::default();
    let salt = [0x42u8; SALT_BYTES];

    let start = Instant::now();
    let master = kdf::derive_master_key("bench-passphrase", &salt, &params).unwrap();
    println!("argon2id             once={:?} (m={} KiB, t={})", start.elapsed(), params.m_cost, params.t_cost);

    let keys = CipherKeys::derive(&master);
    let verifier = keys.verifier();

    let plaintext = vec![0x42u8; 1024];
    let nonce = cipher::nonce_for(1);
    let (ct, tag) = cipher::seal(&keys, &nonce, &plaintext);

    let mut ct_tampered = ct.clone();
    let last = ct_tampered.len() - 1;
    ct_tampered[last] ^= 0x01;

    let mut tag_tampered = tag;
    tag_tampered[0] ^= 0x01;

    // Iters: keep reasonable, adjust as needed
    let iters = 50_000;

    time_it("seal_1k", iters, || {
        let out = cipher::seal(&keys, black_box(&nonce), black_box(&plaintext));
        black_box(out);
    });

    time_it("open_valid", iters, || {
        let pt = cipher::open(&keys, black_box(&nonce), black_box(&ct), black_box(&tag)).unwrap();
        black_box(pt);
    });

    time_it("open_tampered_ct", iters, || {
        let r = cipher::open(&keys, black_box(&nonce), black_box(&ct_tampered), black_box(&tag));
        black_box(r.err());
    });

    time_it("open_tampered_tag", iters, || {
        let r = cipher::open(&keys, black_box(&nonce), black_box(&ct), black_box(&tag_tampered));
        black_box(r.err());
    });

    time_it("verifier_check", iters, || {
        black_box(keys.check_verifier(black_box(&verifier)));
    });

    println!("\nDone.");
}
