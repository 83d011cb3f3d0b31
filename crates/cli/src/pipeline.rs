//! Runs the whole pipeline in one invocation.
//!
//! Store setup runs concurrently with extract and transform; load only starts
//! once both branches have finished. A connected store is closed before the
//! run returns, whatever the outcome.

use hpetl::{CollectionSpec, DocumentStore, EtlError, Stage, StageReport};
use hpetl_extract::ExtractStage;
use hpetl_load::{setup_store, LoadOptions, LoadStage, SetupReport};
use hpetl_transform::TransformStage;
use std::future::Future;
use std::sync::Arc;
use tracing::info;

pub struct PipelinePlan {
    pub extract: ExtractStage,
    pub transform: TransformStage,
    pub collections: Vec<CollectionSpec>,
    /// `None` stops the run after transform without contacting the store.
    pub load: Option<LoadOptions>,
}

#[derive(Debug)]
pub struct PipelineReport {
    pub extract: StageReport,
    pub transform: StageReport,
    pub setup: Option<SetupReport>,
    pub load: Option<StageReport>,
}

/// Executes `plan`. `connect` is only awaited when the plan includes a load.
pub async fn run_pipeline<F>(plan: PipelinePlan, connect: F) -> Result<PipelineReport, EtlError>
where
    F: Future<Output = Result<Arc<dyn DocumentStore>, EtlError>>,
{
    let PipelinePlan {
        extract,
        transform,
        collections,
        load,
    } = plan;
    let load_input = transform.output.clone();

    let stages = async {
        let extract_report = extract.run().await?;
        let transform_report = transform.run().await?;
        Ok::<_, EtlError>((extract_report, transform_report))
    };

    let Some(options) = load else {
        info!("Load skipped; the store is not contacted");
        let (extract, transform) = stages.await?;
        return Ok(PipelineReport {
            extract,
            transform,
            setup: None,
            load: None,
        });
    };

    let setup = async {
        let store = connect.await?;
        match setup_store(store.as_ref(), &collections).await {
            Ok(report) => Ok::<_, EtlError>((store, report)),
            Err(e) => {
                store.close().await;
                Err(e)
            }
        }
    };

    let (stages, setup) = tokio::join!(stages, setup);
    let (store, setup) = setup?;
    let (extract, transform) = match stages {
        Ok(reports) => reports,
        Err(e) => {
            store.close().await;
            return Err(e);
        }
    };

    let load = LoadStage {
        store: Arc::clone(&store),
        input: load_input,
        options,
    }
    .run()
    .await;
    store.close().await;

    Ok(PipelineReport {
        extract,
        transform,
        setup: Some(setup),
        load: Some(load?),
    })
}
