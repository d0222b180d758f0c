//! Benchmarks for the project replica and document encoding.
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use creativeblock::{Category, Idea, IdeaModule, Project, ProjectManager};

fn sample_project(num_ideas: usize) -> Project {
    let mut project = Project::new("Benchmark").with_category(Category::Music);
    for i in 0..num_ideas {
        let mut idea = Idea::new(format!("Idea {}", i));
        idea.add_module(IdeaModule::text("Verse about the sea, second draft"));
        idea.add_module(IdeaModule::image("file:///covers/draft.png", "cover sketch"));
        idea.add_module(IdeaModule::audio("file:///takes/hum.m4a"));
        idea.add_module(IdeaModule::sheet_music("assets/verse.musicxml"));
        project.add_idea(idea);
    }
    project
}

fn bench_new(c: &mut Criterion) {
    c.bench_function("new", |b| {
        b.iter(|| black_box(ProjectManager::new(Project::new("Empty")).unwrap()))
    });
}

fn bench_add_module(c: &mut Criterion) {
    c.bench_function("add_module", |b| {
        let mut manager = ProjectManager::new(sample_project(1)).unwrap();
        b.iter(|| {
            manager
                .add_module(0, IdeaModule::text("another line"))
                .unwrap();
        })
    });
}

fn bench_update_module(c: &mut Criterion) {
    c.bench_function("update_module", |b| {
        let mut manager = ProjectManager::new(sample_project(10)).unwrap();
        let mut i = 0u64;
        b.iter(|| {
            manager
                .update_module(5, 0, IdeaModule::text(format!("revision {}", i)))
                .unwrap();
            i += 1;
        })
    });
}

fn bench_targeted_title(c: &mut Criterion) {
    c.bench_function("set_title_targeted", |b| {
        let mut manager = ProjectManager::new(sample_project(10)).unwrap();
        let mut i = 0u64;
        b.iter(|| {
            manager.set_title(&format!("Title {}", i)).unwrap();
            i += 1;
        })
    });
}

fn bench_get_state(c: &mut Criterion) {
    let mut group = c.benchmark_group("get_state");

    for num_ideas in [10, 100, 500].iter() {
        let mut manager = ProjectManager::new(sample_project(*num_ideas)).unwrap();
        let bytes = manager.save();

        group.bench_with_input(BenchmarkId::new("ideas", num_ideas), &bytes, |b, bytes| {
            b.iter(|| {
                // Uncached: hydrate from a freshly loaded replica.
                let mut loaded = ProjectManager::from_bytes(bytes).unwrap();
                black_box(loaded.get_state().unwrap())
            })
        });
    }

    group.finish();
}

fn bench_save(c: &mut Criterion) {
    let mut group = c.benchmark_group("save");

    for num_ideas in [10, 100, 500].iter() {
        let mut manager = ProjectManager::new(sample_project(*num_ideas)).unwrap();
        group.bench_with_input(BenchmarkId::new("ideas", num_ideas), num_ideas, |b, _| {
            b.iter(|| black_box(manager.save()))
        });
    }

    group.finish();
}

fn bench_document_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("document_round_trip");

    for num_ideas in [10, 100, 500].iter() {
        let project = sample_project(*num_ideas);
        group.bench_with_input(
            BenchmarkId::new("ideas", num_ideas),
            &project,
            |b, project| {
                b.iter(|| {
                    let document = project.to_document();
                    black_box(Project::from_document(&document).unwrap())
                })
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_new,
    bench_add_module,
    bench_update_module,
    bench_targeted_title,
    bench_get_state,
    bench_save,
    bench_document_round_trip,
);

criterion_main!(benches);
