use std::time::{Duration, Instant};

use rand::{rngs::StdRng, Rng, SeedableRng};

use meshpack::{
    convert_storage, pack_halo, transpose_bytes, ConvertSpec, HaloAxis, MeshLayout, MeshView,
    StorageMode, Tuning,
};

fn median(samples: &mut [Duration]) -> Duration {
    samples.sort();
    let n = samples.len();
    if n % 2 == 1 {
        samples[n / 2]
    } else {
        (samples[n / 2 - 1] + samples[n / 2]) / 2
    }
}

fn bench_n(label: &str, warmup: usize, iters: usize, bytes: usize, mut f: impl FnMut()) {
    for _ in 0..warmup {
        f();
    }
    let mut samples = Vec::with_capacity(iters);
    for _ in 0..iters {
        let t0 = Instant::now();
        f();
        samples.push(t0.elapsed());
    }
    let med = median(&mut samples);
    let ms = med.as_secs_f64() * 1e3;
    let gbps = (bytes as f64) / med.as_secs_f64() / 1e9;
    println!("  {label:36} {ms:8.3} ms  {gbps:6.2} GB/s");
}

fn random_bytes(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut data = vec![0u8; len];
    rng.fill(data.as_mut_slice());
    data
}

fn main() {
    let tuning = Tuning::default();

    println!("transpose (8-byte elements):");
    {
        let size_in = [128usize, 128, 128];
        let size_out = [128usize, 128, 128];
        let perm = [2usize, 0, 1];
        let total: usize = size_in.iter().product();
        let src = random_bytes(total * 8, 1);
        let mut dst = vec![0u8; total * 8];
        bench_n("128^3 rotate axes", 3, 20, total * 8 * 2, || {
            transpose_bytes(&src, &mut dst, 8, &size_in, &size_out, &perm, &tuning).unwrap();
        });
    }

    println!("storage conversion:");
    {
        let spatial = [96usize, 96, 96];
        let total: usize = spatial.iter().product::<usize>() * 4 * 8;
        let src = random_bytes(total, 2);
        let mut dst = vec![0u8; total];
        let spec = ConvertSpec {
            spatial_from: &spatial,
            spatial_to: &spatial,
            components: 4,
            type_size: 8,
            from: StorageMode::Interleaved,
            to: StorageMode::Planar,
            repeat: 1,
        };
        bench_n("96^3 x4 interleaved->planar", 3, 20, total * 2, || {
            convert_storage(&src, &mut dst, &spec, &tuning).unwrap();
        });
    }

    println!("halo packing:");
    {
        let layout =
            MeshLayout::new(&[258, 258, 258], &[-1, -1, -1], 1, 8, StorageMode::Interleaved)
                .unwrap();
        let data = random_bytes(layout.required_bytes(), 3);
        let view = MeshView::new(&layout, &data).unwrap();
        // One face of depth 2.
        let axes = [
            HaloAxis {
                start: 1,
                end: 3,
                step: 1,
                buf_stride: 1,
            },
            HaloAxis {
                start: 1,
                end: 257,
                step: 1,
                buf_stride: 2,
            },
            HaloAxis {
                start: 1,
                end: 257,
                step: 1,
                buf_stride: 2 * 256,
            },
        ];
        let elems = 2 * 256 * 256;
        let mut buf = vec![0u8; elems * 8];
        bench_n("256^2 face, depth 2", 3, 20, elems * 8 * 2, || {
            pack_halo(&mut buf, 0, &view, &axes).unwrap();
        });
    }
}
