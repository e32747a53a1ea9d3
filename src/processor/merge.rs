//! Top-level merge request handling.
//!
//! # Process
//!
//! 1. Build and validate derived variables, incorporating them (and any
//!    computed variables) into a per-request copy of the metadata.
//! 2. Build the entity stream tree for the target entity.
//! 3. Collect the streams the tree needs and open them all concurrently.
//! 4. Copy the single stream through if the tree has nothing to do,
//!    otherwise hand every stream to the tree.

use log::info;
use serde::Serialize;

use super::fetch::{fetch_all, FetchRequest, StreamFetcher};
use super::output::{MergedStream, PassthroughStream};
use super::request::MergeRequest;
use crate::config::MergeSettings;
use crate::derived::{DerivedVariableFactory, PluginRegistry};
use crate::error::{MergeError, MergeResult};
use crate::metadata::{ReferenceMetadata, VariableSpec};
use crate::stream::StreamSpec;
use crate::tree::{RootEntityStreamNode, TreeContext};

/// What a merge would read and write, without reading anything.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergePlan {
    pub output_columns: Vec<String>,
    pub streams: Vec<StreamSpec>,
    pub passthrough: bool,
    /// Rendered entity stream tree.
    pub tree: String,
}

/// Validates one [`MergeRequest`] and produces its merged rows.
pub struct MergeRequestProcessor {
    request: MergeRequest,
    metadata: ReferenceMetadata,
    factory: DerivedVariableFactory,
    settings: MergeSettings,
}

impl MergeRequestProcessor {
    /// Resolve the request's derived and computed variables against
    /// `metadata`. Every configuration error surfaces here.
    pub fn new(
        mut metadata: ReferenceMetadata,
        request: MergeRequest,
        registry: &PluginRegistry,
        settings: MergeSettings,
    ) -> MergeResult<Self> {
        if request.study_id != metadata.study_id() {
            return Err(MergeError::StudyMismatch {
                requested: request.study_id,
                loaded: metadata.study_id().to_string(),
            });
        }
        metadata.entity(&request.entity_id)?;

        let factory =
            DerivedVariableFactory::new(&mut metadata, &request.derived_variables, registry)?;
        metadata.incorporate_computed(&request.computed_variables)?;

        Ok(Self {
            request,
            metadata,
            factory,
            settings,
        })
    }

    pub fn request(&self) -> &MergeRequest {
        &self.request
    }

    /// Metadata including this request's derived and computed variables.
    pub fn metadata(&self) -> &ReferenceMetadata {
        &self.metadata
    }

    /// Target and ancestor id columns followed by the requested variables.
    pub fn output_variables(&self) -> MergeResult<Vec<VariableSpec>> {
        Ok(self
            .metadata
            .tabular_columns(&self.request.entity_id, &self.request.output_variables)?
            .into_iter()
            .map(|def| def.spec)
            .collect())
    }

    /// Build a fresh entity stream tree for this request.
    pub fn build_tree(&self) -> MergeResult<RootEntityStreamNode> {
        let ctx = TreeContext {
            metadata: &self.metadata,
            factory: &self.factory,
            settings: &self.settings.tree,
        };
        let root = RootEntityStreamNode::build(
            &ctx,
            &self.request.entity_id,
            &self.output_variables()?,
            &self.request.computed_specs(),
        )?;
        info!("Created the following entity node tree:\n{}", root);
        Ok(root)
    }

    pub fn plan(&self) -> MergeResult<MergePlan> {
        let root = self.build_tree()?;
        Ok(MergePlan {
            output_columns: root.output_columns().to_vec(),
            streams: root.required_stream_specs(),
            passthrough: root.requires_no_data_manipulation(),
            tree: root.to_string(),
        })
    }

    /// Open every required stream and return the rows to write.
    pub async fn process(&self, fetcher: &dyn StreamFetcher) -> MergeResult<MergedStream> {
        let mut root = self.build_tree()?;
        let specs = root.required_stream_specs();
        let requests = specs
            .iter()
            .map(|spec| -> MergeResult<FetchRequest> {
                let columns: Vec<String> = self
                    .metadata
                    .tabular_columns(&spec.entity_id, &spec.variables)?
                    .iter()
                    .map(|def| def.column_name())
                    .collect();
                Ok(FetchRequest {
                    spec,
                    columns,
                    filters: spec.effective_filters(&self.request.filters),
                })
            })
            .collect::<MergeResult<Vec<_>>>()?;

        let timeout = self.settings.fetch.timeout_duration()?;
        let mut streams = fetch_all(fetcher, &requests, timeout).await?;

        if root.requires_no_data_manipulation() {
            let target = root.target_stream_spec().name.clone();
            if let Some(source) = streams.remove(&target) {
                info!("Transferring stream {} to output since there is only one stream", target);
                return Ok(MergedStream::Passthrough(PassthroughStream::new(
                    &target,
                    root.output_columns().to_vec(),
                    source,
                )?));
            }
        }

        root.accept_streams(streams)?;
        Ok(MergedStream::Merged(root))
    }
}
