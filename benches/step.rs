use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use glam::{DMat3, DVec3};
use parmec_dem::callback::VectorFn;
use parmec_dem::World;
use rand::Rng;

fn build_world(num_particles: usize) -> World {
    let mut world = World::new();
    let mat = world.add_material(1.0, 1.0e9, 0.3).unwrap();
    let mut rng = rand::thread_rng();
    let pos_limit = 50.0;
    let vel_limit = 2.0;
    let radius = 0.5;
    let mass = 1.0;
    let inertia = DMat3::from_diagonal(DVec3::splat(0.4 * mass * radius * radius));

    for _ in 0..num_particles {
        let pos = DVec3::new(
            rng.gen_range(-pos_limit..pos_limit),
            rng.gen_range(-pos_limit..pos_limit),
            rng.gen_range(-pos_limit..pos_limit),
        );
        let handle = world.add_sphere_particle(mass, inertia, mat, pos, radius, 0).unwrap();
        world.particles[handle].lin_vel = DVec3::new(
            rng.gen_range(-vel_limit..vel_limit),
            rng.gen_range(-vel_limit..vel_limit),
            rng.gen_range(-vel_limit..vel_limit),
        );
    }
    world.set_gravity(VectorFn::Constant(DVec3::new(0.0, 0.0, -9.81)));
    world
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("step");
    for num_particles in [32, 64, 128, 256, 512] {
        group.bench_with_input(
            BenchmarkId::new("step many spheres", num_particles),
            &num_particles,
            |b, &num_particles| {
                b.iter_batched(
                    || build_world(num_particles),
                    |mut world| {
                        world.step(black_box(1e-4), 1.0).unwrap();
                    },
                    BatchSize::SmallInput,
                )
            },
        );
    }
    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
