use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use dstruct::simulate::{simulate_dag, simulate_linear_sem, simulate_parameter, GraphType};
use dstruct::{
    DStruct, DualAscentState, EnsembleConfig, LearnerConfig, ModelConfig, NotearsLearner,
    SemType, Shuffled, StructuralModel,
};
use nalgebra::DMatrix;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn dataset(d: usize, n: usize) -> DMatrix<f64> {
    let mut rng = StdRng::seed_from_u64(0);
    let b = simulate_dag(d, d, GraphType::ErdosRenyi, &mut rng);
    let w = simulate_parameter(&b, &mut rng);
    simulate_linear_sem(&w, n, 1.0, &mut rng).expect("simulated graph is acyclic")
}

fn bench_loss_and_gradient(c: &mut Criterion) {
    let mut group = c.benchmark_group("loss_and_gradient");
    let state = DualAscentState::new(10.0, 1.0);

    for d in [5, 10, 20] {
        let x = dataset(d, 200);
        for sem_type in [SemType::Mlp, SemType::Sobolev] {
            let model = StructuralModel::new(&ModelConfig {
                dim: d,
                sem_type,
                lambda1: 0.01,
                lambda2: 0.01,
                ..ModelConfig::default()
            })
            .unwrap();
            group.bench_with_input(
                BenchmarkId::new(sem_type.to_string(), d),
                &d,
                |b, _| b.iter(|| black_box(model.loss_and_gradient(black_box(&x), &state))),
            );
        }
    }

    group.finish();
}

fn bench_acyclicity(c: &mut Criterion) {
    let mut group = c.benchmark_group("acyclicity");
    for d in [5, 10, 20, 50] {
        let model = StructuralModel::new(&ModelConfig {
            dim: d,
            ..ModelConfig::default()
        })
        .unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(d), &d, |b, _| {
            b.iter(|| black_box(model.acyclicity()))
        });
    }
    group.finish();
}

fn bench_training_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("training_step");
    group.sample_size(10);
    let x = dataset(5, 200);

    group.bench_function("notears_mlp_d5", |b| {
        b.iter(|| {
            let mut config = LearnerConfig::with_dim(5);
            config.solver.max_iter = 100;
            let mut learner = NotearsLearner::new(config).unwrap();
            black_box(learner.training_step(&x).unwrap())
        })
    });

    group.bench_function("dstruct_k3_d5", |b| {
        b.iter(|| {
            let mut config = EnsembleConfig {
                learner: LearnerConfig::with_dim(5),
                k: 3,
                lmbda: 2.0,
            };
            config.learner.solver.max_iter = 100;
            let mut ensemble = DStruct::new(config, Shuffled::new(0)).unwrap();
            black_box(ensemble.training_step(&x).unwrap())
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_loss_and_gradient,
    bench_acyclicity,
    bench_training_step
);
criterion_main!(benches);
