use product_shorts::api::{FakeGenerator, FakeImageGenerator};
use product_shorts::catalog::Catalog;
use product_shorts::config::{ImageOptions, ImageUrlSource, PackGenOptions, RunOptions};
use product_shorts::download::ImageDownloader;
use product_shorts::images::{CAPTIONS_FILE, ImagePipeline};
use product_shorts::pack::{Pack, RESULT_FILE, Section};
use product_shorts::packgen::generate_packs;
use product_shorts::processor::{PackOutcome, PackProcessor, SkipReason};
use product_shorts::{Error, index};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::fs;

const SCENES_REPLY: &str = "1. Mesa clara, 9:16, sem texto\n2. Mão segurando, 9:16, sem texto\n\
    3. Close lateral, 9:16, sem texto\n4. Cozinha, 9:16, sem texto\n\
    5. Escritório, 9:16, sem texto\n6. Varanda, 9:16, sem texto";
const SCRIPT_REPLY: &str = "Cansado de fio na mesa?\nEsse mouse resolve. Link na bio.";

fn description_reply() -> String {
    let tags: Vec<String> = (1..=12).map(|i| format!("#achado{i}")).collect();
    format!("Um achado para o dia a dia.\n\n{}", tags.join(" "))
}

fn happy_generator() -> FakeGenerator {
    FakeGenerator::new()
        .with_response("ideias visuais", SCENES_REPLY)
        .with_response("gere um roteiro", SCRIPT_REPLY)
        .with_response("escreva uma descrição", &description_reply())
}

async fn make_packs(tmp: &TempDir, products: &[&str]) -> PathBuf {
    let csv_path = tmp.path().join("batch.csv");
    let mut csv = String::from("produto,shopee_image_urls\n");
    for p in products {
        csv.push_str(&format!("{p},\n"));
    }
    fs::write(&csv_path, csv).await.unwrap();

    let packs_root = tmp.path().join("packs");
    generate_packs(&PackGenOptions {
        csv_path: csv_path.clone(),
        packs_root: packs_root.clone(),
        guide_path: None,
        guide_required: false,
    })
    .await
    .unwrap();
    packs_root
}

fn run_options(packs_root: &Path) -> RunOptions {
    RunOptions {
        packs_root: packs_root.to_path_buf(),
        ..RunOptions::default()
    }
}

#[tokio::test]
async fn full_run_writes_responses_and_consolidated_result() {
    let tmp = tempfile::tempdir().unwrap();
    let root = make_packs(&tmp, &["Mouse sem fio", "Copo térmico"]).await;
    let fake = happy_generator();

    let summary = PackProcessor::new(&fake, run_options(&root))
        .run()
        .await
        .unwrap();

    assert_eq!(summary.processed, 2);
    assert_eq!(summary.section_errors, 0);
    assert_eq!(summary.generation_calls, 6);
    assert_eq!(fake.call_count(), 6);

    let pack = Pack::from_dir(root.join("001-mouse-sem-fio")).unwrap();
    for section in Section::ALL {
        assert!(pack.response_path(section).is_file(), "{:?}", section);
    }
    let ready = fs::read_to_string(pack.response_path(Section::VideoAssembly))
        .await
        .unwrap();
    assert!(ready.contains(SCRIPT_REPLY));
    assert!(!ready.contains("[roteiro Chatgpt]"));

    let result = fs::read_to_string(pack.dir.join(RESULT_FILE)).await.unwrap();
    assert!(result.starts_with("# 001-mouse-sem-fio\n\n## IMAGENS (ChatGPT)\n\n1. Mesa clara"));
    assert!(result.contains("## ROTEIRO (ChatGPT)\n\nCansado de fio na mesa?"));
    assert!(result.contains("#achado12"));
}

#[tokio::test]
async fn skip_existing_makes_no_calls_and_leaves_results_untouched() {
    let tmp = tempfile::tempdir().unwrap();
    let root = make_packs(&tmp, &["Mouse sem fio"]).await;
    let fake = happy_generator();

    PackProcessor::new(&fake, run_options(&root)).run().await.unwrap();
    let result_path = root.join("001-mouse-sem-fio").join(RESULT_FILE);
    let before = fs::read(&result_path).await.unwrap();
    let calls_before = fake.call_count();

    let options = RunOptions {
        skip_existing: true,
        ..run_options(&root)
    };
    let mut processor = PackProcessor::new(&fake, options);
    let summary = processor.run().await.unwrap();

    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.processed, 0);
    assert_eq!(fake.call_count(), calls_before);
    assert_eq!(fs::read(&result_path).await.unwrap(), before);

    let pack = Pack::from_dir(root.join("001-mouse-sem-fio")).unwrap();
    assert_eq!(
        processor.process_pack(&pack).await.unwrap(),
        PackOutcome::Skipped(SkipReason::ResultExists)
    );
}

#[tokio::test]
async fn failing_section_leaves_placeholder_and_batch_continues() {
    let tmp = tempfile::tempdir().unwrap();
    let root = make_packs(&tmp, &["Mouse sem fio", "Copo térmico"]).await;
    let fake = FakeGenerator::new()
        .with_response("ideias visuais", SCENES_REPLY)
        .with_response("gere um roteiro", SCRIPT_REPLY)
        .with_failure("escreva uma descrição", "rate limited");

    let summary = PackProcessor::new(&fake, run_options(&root))
        .run()
        .await
        .unwrap();
    assert_eq!(summary.processed, 2);
    assert_eq!(summary.section_errors, 2);

    let result = fs::read_to_string(root.join("002-copo-térmico").join(RESULT_FILE))
        .await
        .unwrap();
    assert!(result.contains("[ERRO ao gerar descrição: API request failed: rate limited]"));
    assert!(result.contains("Cansado de fio na mesa?"));
}

#[tokio::test]
async fn missing_prompts_skip_pack_or_leave_markers() {
    let tmp = tempfile::tempdir().unwrap();
    let root = make_packs(&tmp, &["Mouse sem fio", "Copo térmico"]).await;
    let no_script = Pack::from_dir(root.join("001-mouse-sem-fio")).unwrap();
    let no_description = Pack::from_dir(root.join("002-copo-térmico")).unwrap();
    fs::remove_file(no_script.prompt_path(Section::Script)).await.unwrap();
    fs::remove_file(no_description.prompt_path(Section::Description))
        .await
        .unwrap();
    let fake = happy_generator();

    let summary = PackProcessor::new(&fake, run_options(&root))
        .run()
        .await
        .unwrap();

    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.generation_calls, 2);
    assert_eq!(fake.call_count(), 2);
    assert!(!no_script.dir.join(RESULT_FILE).exists());

    let result = fs::read_to_string(no_description.dir.join(RESULT_FILE))
        .await
        .unwrap();
    assert!(result.contains("[Sem prompt_04_descricao_hashtags.txt]"));
    assert!(result.contains("Cansado de fio na mesa?"));
    assert!(!no_description.response_path(Section::Description).exists());

    let processor = PackProcessor::new(&fake, run_options(&root));
    assert_eq!(
        processor.process_pack(&no_script).await.unwrap(),
        PackOutcome::Skipped(SkipReason::MissingScriptPrompt)
    );
}

#[tokio::test]
async fn only_final_with_output_root_writes_flat_results() {
    let tmp = tempfile::tempdir().unwrap();
    let root = make_packs(&tmp, &["Mouse sem fio"]).await;
    let out = tmp.path().join("finais");
    let fake = happy_generator();

    let options = RunOptions {
        output_root: Some(out.clone()),
        only_final: true,
        ..run_options(&root)
    };
    PackProcessor::new(&fake, options).run().await.unwrap();

    assert!(out.join("001-mouse-sem-fio.txt").is_file());
    let pack = Pack::from_dir(root.join("001-mouse-sem-fio")).unwrap();
    for section in Section::ALL {
        assert!(!pack.response_path(section).exists());
    }
    assert!(!pack.dir.join(RESULT_FILE).exists());

    let rows = index::export_index(&root, Some(&out), &tmp.path().join("index.csv"))
        .await
        .unwrap();
    assert_eq!(rows[0].first_script_line, "Cansado de fio na mesa?");
    assert_eq!(rows[0].hashtags, 12);
}

#[tokio::test]
async fn empty_packs_root_is_fatal() {
    let tmp = tempfile::tempdir().unwrap();
    let fake = FakeGenerator::new();
    let err = PackProcessor::new(&fake, run_options(tmp.path()))
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::NoPacks { .. })));
}

async fn pack_with_scenes(tmp: &TempDir) -> Pack {
    let pack = Pack::from_dir(tmp.path().join("packs/001-mouse")).unwrap();
    fs::create_dir_all(&pack.dir).await.unwrap();
    let scenes = SCENES_REPLY.replace("Close lateral", "Cena proibida");
    fs::write(pack.response_path(Section::Scenes), scenes).await.unwrap();
    pack
}

#[tokio::test]
async fn images_use_reference_and_record_failures() {
    let tmp = tempfile::tempdir().unwrap();
    let pack = pack_with_scenes(&tmp).await;
    fs::write(pack.dir.join("001-mouse_img1.png"), b"\x89PNG\r\n\x1a\nref")
        .await
        .unwrap();

    let fake = FakeImageGenerator::new().failing_on("Cena proibida");
    let options = ImageOptions {
        packs_root: tmp.path().join("packs"),
        ..ImageOptions::default()
    };
    let summary = ImagePipeline::new(&fake, options.clone()).run().await.unwrap();

    assert_eq!(summary.generated, 5);
    assert_eq!(summary.failed, 1);
    let calls = fake.calls();
    assert!(calls[0].starts_with("edit:Mesa clara"));
    // The failing edit falls back to text-to-image, which fails too.
    assert!(calls.iter().any(|c| c.starts_with("generate:Cena proibida")));

    assert!(pack.dir.join("001.png").is_file());
    assert!(!pack.dir.join("003.png").exists());
    let error = fs::read_to_string(pack.dir.join("003_ERROR.txt")).await.unwrap();
    assert!(error.starts_with("Prompt:\nCena proibida"));
    assert!(error.contains("Erro:\nAPI returned error: 400"));

    let captions = fs::read_to_string(pack.dir.join(CAPTIONS_FILE)).await.unwrap();
    assert_eq!(captions.lines().count(), 5);
    assert!(captions.lines().next().unwrap().starts_with("001.png | Mesa clara"));

    // Second pass only retries the missing image.
    let calls_before = fake.calls().len();
    ImagePipeline::new(&fake, options).run().await.unwrap();
    let retried: Vec<String> = fake.calls()[calls_before..].to_vec();
    assert!(retried.iter().all(|c| c.contains("Cena proibida")));
}

#[tokio::test]
async fn images_without_edit_support_fall_back_to_generation() {
    let tmp = tempfile::tempdir().unwrap();
    let pack = pack_with_scenes(&tmp).await;
    let source = tmp.path().join("finais");
    fs::create_dir_all(&source).await.unwrap();
    fs::write(source.join("001-mouse_img1.png"), b"\x89PNG\r\n\x1a\nref")
        .await
        .unwrap();
    let out = tmp.path().join("imagens");

    let fake = FakeImageGenerator::new().without_edit();
    let options = ImageOptions {
        packs_root: tmp.path().join("packs"),
        source_root: Some(source),
        output_root: Some(out.clone()),
        ..ImageOptions::default()
    };
    let result = ImagePipeline::new(&fake, options)
        .process_pack(&pack)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(result.generated, 6);
    assert_eq!(result.fell_back, 6);
    assert!(fake.calls()[0].starts_with("edit-unsupported:"));
    assert!(fake.calls()[1].starts_with("generate:"));
    assert!(out.join("001-mouse/006.png").is_file());
}

#[tokio::test]
async fn unreachable_reference_images_do_not_fail_the_pack() {
    let tmp = tempfile::tempdir().unwrap();
    let root = make_packs(&tmp, &["Mouse sem fio"]).await;
    let csv = "produto,shopee_image_urls\nMouse sem fio,http://127.0.0.1:1/mouse.jpg\n";
    let catalog = Catalog::from_reader(csv.as_bytes(), Path::new("batch.csv")).unwrap();
    let fake = happy_generator();

    let options = RunOptions {
        download_images: true,
        image_source: ImageUrlSource::Csv,
        ..run_options(&root)
    };
    let mut processor = PackProcessor::new(&fake, options)
        .with_catalog(catalog)
        .with_downloader(ImageDownloader::new().unwrap());
    let summary = processor.run().await.unwrap();

    assert_eq!(summary.processed, 1);
    assert_eq!(summary.images_downloaded, 0);
    assert!(root.join("001-mouse-sem-fio").join(RESULT_FILE).is_file());
}
