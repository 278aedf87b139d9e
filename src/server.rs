//! Plugin server for the Hemmer provider protocol.
//!
//! [`ProviderService`] is the high-level trait the provider implements;
//! [`serve`] wraps it in the generated gRPC service, prints the handshake
//! line and runs until the engine stops it.
//!
//! # Signal Handling
//!
//! On SIGTERM or SIGINT the server stops accepting connections, waits up to
//! [`ServeOptions::shutdown_timeout`] for in-flight requests, calls
//! [`ProviderService::stop`] and returns.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tonic::transport::Server;
use tonic::{Request, Response, Status};
use tracing::{debug, error, info, instrument, warn};

use crate::error::ProviderError;
use crate::generated;
use crate::schema::{has_errors, Block, Diagnostic, DiagnosticSeverity, ProviderSchema, Schema};
use crate::types::{
    ImportedResource, PlanResult, ProviderMetadata, HANDSHAKE_PREFIX, PROTOCOL_VERSION,
};

/// Operations a provider offers to the engine.
///
/// State, configuration and data source results are plain JSON values. The
/// gRPC layer takes care of encoding them and of turning every error into a
/// diagnostic on the response.
#[async_trait::async_trait]
pub trait ProviderService: Send + Sync + 'static {
    /// Return the provider's schema including all resources and data sources.
    fn schema(&self) -> ProviderSchema;

    /// Return provider metadata. By default, this is derived from the schema.
    fn metadata(&self) -> ProviderMetadata {
        let schema = self.schema();
        let mut resources: Vec<String> = schema.resources.into_keys().collect();
        let mut data_sources: Vec<String> = schema.data_sources.into_keys().collect();
        resources.sort();
        data_sources.sort();
        ProviderMetadata {
            resources,
            data_sources,
            capabilities: Default::default(),
        }
    }

    /// Validate the provider configuration without applying it.
    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = config;
        Ok(vec![])
    }

    /// Configure the provider with credentials and settings.
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError>;

    /// Stop the provider gracefully.
    async fn stop(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    /// Validate a resource's configuration before planning.
    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = (resource_type, config);
        Ok(vec![])
    }

    /// Plan changes for a resource. A null `proposed_state` plans a destroy.
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError>;

    /// Create a new resource.
    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError>;

    /// Read the current state of a resource.
    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError>;

    /// Update an existing resource.
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError>;

    /// Delete a resource.
    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError>;

    /// Import an existing remote object into management.
    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        let _ = id;
        Err(ProviderError::InvalidRequest(format!(
            "import not supported for resource type: {}",
            resource_type
        )))
    }

    /// Read data from a data source.
    async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let _ = config;
        Err(ProviderError::UnknownResource(data_source_type.to_string()))
    }
}

/// Wrapper that implements the generated gRPC trait.
struct ProviderGrpcService<P: ProviderService> {
    provider: Arc<P>,
}

fn diagnostic_to_proto(d: Diagnostic) -> generated::Diagnostic {
    let severity = match d.severity {
        DiagnosticSeverity::Error => generated::diagnostic::Severity::Error,
        DiagnosticSeverity::Warning => generated::diagnostic::Severity::Warning,
    };
    generated::Diagnostic {
        severity: severity as i32,
        summary: d.summary,
        detail: d.detail.unwrap_or_default(),
        attribute: d.attribute.unwrap_or_default(),
    }
}

fn diagnostics_to_proto(diagnostics: Vec<Diagnostic>) -> Vec<generated::Diagnostic> {
    diagnostics.into_iter().map(diagnostic_to_proto).collect()
}

fn error_to_proto(err: &ProviderError) -> Vec<generated::Diagnostic> {
    vec![diagnostic_to_proto(err.to_diagnostic())]
}

fn schema_to_proto(schema: &Schema) -> generated::Schema {
    generated::Schema {
        version: schema.version as i64,
        block: Some(block_to_proto(&schema.block)),
    }
}

fn block_to_proto(block: &Block) -> generated::Block {
    let mut attributes: Vec<generated::Attribute> = block
        .attributes
        .iter()
        .map(|(name, attr)| generated::Attribute {
            name: name.clone(),
            r#type: serde_json::to_vec(&attr.attr_type).unwrap_or_default(),
            required: attr.flags.required,
            optional: attr.flags.optional,
            computed: attr.flags.computed,
            sensitive: attr.flags.sensitive,
            description: attr.description.clone().unwrap_or_default(),
            force_new: attr.force_new,
            default_value: attr
                .default
                .as_ref()
                .and_then(|v| serde_json::to_vec(v).ok())
                .unwrap_or_default(),
        })
        .collect();
    attributes.sort_by(|a, b| a.name.cmp(&b.name));

    generated::Block {
        attributes,
        description: block.description.clone().unwrap_or_default(),
    }
}

/// Decode a JSON payload. An empty payload is null.
fn decode(bytes: &[u8]) -> Result<Value, ProviderError> {
    if bytes.is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_slice(bytes)?)
}

fn encode(value: &Value) -> Result<Vec<u8>, ProviderError> {
    Ok(serde_json::to_vec(value)?)
}

fn log_diagnostics(operation: &str, diagnostics: &[Diagnostic]) {
    if has_errors(diagnostics) {
        warn!(
            diagnostics = diagnostics.len(),
            "{} completed with errors", operation
        );
    } else {
        info!("{} completed successfully", operation);
    }
}

impl<P: ProviderService> ProviderGrpcService<P> {
    async fn plan_inner(
        &self,
        req: &generated::PlanRequest,
    ) -> Result<generated::PlanResponse, ProviderError> {
        let prior_state = match decode(&req.prior_state)? {
            Value::Null => None,
            state => Some(state),
        };
        let proposed_state = decode(&req.proposed_state)?;
        let config = decode(&req.config)?;

        let result = self
            .provider
            .plan(&req.resource_type, prior_state, proposed_state, config)
            .await?;

        info!(
            resource_type = %req.resource_type,
            changes = result.changes.len(),
            requires_replace = result.requires_replace,
            "Plan completed"
        );
        Ok(generated::PlanResponse {
            planned_state: encode(&result.planned_state)?,
            changes: result.changes.into_iter().map(Into::into).collect(),
            requires_replace: result.requires_replace,
            diagnostics: vec![],
        })
    }

    async fn create_inner(&self, req: &generated::CreateRequest) -> Result<Vec<u8>, ProviderError> {
        let planned_state = decode(&req.planned_state)?;
        let state = self.provider.create(&req.resource_type, planned_state).await?;
        encode(&state)
    }

    async fn read_inner(&self, req: &generated::ReadRequest) -> Result<Vec<u8>, ProviderError> {
        let current_state = decode(&req.current_state)?;
        let state = self.provider.read(&req.resource_type, current_state).await?;
        encode(&state)
    }

    async fn update_inner(&self, req: &generated::UpdateRequest) -> Result<Vec<u8>, ProviderError> {
        let prior_state = decode(&req.prior_state)?;
        let planned_state = decode(&req.planned_state)?;
        let state = self
            .provider
            .update(&req.resource_type, prior_state, planned_state)
            .await?;
        encode(&state)
    }

    async fn delete_inner(&self, req: &generated::DeleteRequest) -> Result<(), ProviderError> {
        let current_state = decode(&req.current_state)?;
        self.provider.delete(&req.resource_type, current_state).await
    }

    async fn import_inner(
        &self,
        req: &generated::ImportResourceStateRequest,
    ) -> Result<Vec<generated::ImportedResource>, ProviderError> {
        let imported = self
            .provider
            .import_resource(&req.resource_type, &req.id)
            .await?;
        imported
            .into_iter()
            .map(|r| generated::ImportedResource::try_from(r).map_err(ProviderError::from))
            .collect()
    }

    async fn read_data_source_inner(
        &self,
        req: &generated::ReadDataSourceRequest,
    ) -> Result<Vec<u8>, ProviderError> {
        let config = decode(&req.config)?;
        let state = self
            .provider
            .read_data_source(&req.data_source_type, config)
            .await?;
        encode(&state)
    }
}

#[tonic::async_trait]
impl<P: ProviderService> generated::provider_server::Provider for ProviderGrpcService<P> {
    #[instrument(skip(self, _request), name = "grpc.get_metadata")]
    async fn get_metadata(
        &self,
        _request: Request<generated::GetMetadataRequest>,
    ) -> Result<Response<generated::GetMetadataResponse>, Status> {
        let metadata = self.provider.metadata();
        debug!(
            resources = metadata.resources.len(),
            data_sources = metadata.data_sources.len(),
            "GetMetadata completed"
        );
        Ok(Response::new(generated::GetMetadataResponse {
            server_capabilities: Some(metadata.capabilities.into()),
            resources: metadata.resources,
            data_sources: metadata.data_sources,
            diagnostics: vec![],
        }))
    }

    #[instrument(skip(self, _request), name = "grpc.get_schema")]
    async fn get_schema(
        &self,
        _request: Request<generated::GetSchemaRequest>,
    ) -> Result<Response<generated::GetSchemaResponse>, Status> {
        let schema = self.provider.schema();
        debug!(
            resources = schema.resources.len(),
            data_sources = schema.data_sources.len(),
            "GetSchema completed"
        );
        Ok(Response::new(generated::GetSchemaResponse {
            provider: Some(schema_to_proto(&schema.provider)),
            resources: schema
                .resources
                .iter()
                .map(|(k, v)| (k.clone(), schema_to_proto(v)))
                .collect(),
            data_sources: schema
                .data_sources
                .iter()
                .map(|(k, v)| (k.clone(), schema_to_proto(v)))
                .collect(),
            diagnostics: vec![],
        }))
    }

    #[instrument(skip(self, request), name = "grpc.validate_provider_config")]
    async fn validate_provider_config(
        &self,
        request: Request<generated::ValidateProviderConfigRequest>,
    ) -> Result<Response<generated::ValidateProviderConfigResponse>, Status> {
        let req = request.into_inner();
        let result = match decode(&req.config) {
            Ok(config) => self.provider.validate_provider_config(config).await,
            Err(e) => Err(e),
        };

        let diagnostics = match result {
            Ok(diagnostics) => {
                log_diagnostics("ValidateProviderConfig", &diagnostics);
                diagnostics_to_proto(diagnostics)
            },
            Err(e) => {
                error!(error = %e, "ValidateProviderConfig failed");
                error_to_proto(&e)
            },
        };
        Ok(Response::new(generated::ValidateProviderConfigResponse {
            diagnostics,
        }))
    }

    #[instrument(skip(self, request), name = "grpc.configure")]
    async fn configure(
        &self,
        request: Request<generated::ConfigureRequest>,
    ) -> Result<Response<generated::ConfigureResponse>, Status> {
        let req = request.into_inner();
        let result = match decode(&req.config) {
            Ok(config) => self.provider.configure(config).await,
            Err(e) => Err(e),
        };

        let diagnostics = match result {
            Ok(diagnostics) => {
                log_diagnostics("Configure", &diagnostics);
                diagnostics_to_proto(diagnostics)
            },
            Err(e) => {
                error!(error = %e, "Configure failed");
                error_to_proto(&e)
            },
        };
        Ok(Response::new(generated::ConfigureResponse { diagnostics }))
    }

    #[instrument(skip(self, _request), name = "grpc.stop")]
    async fn stop(
        &self,
        _request: Request<generated::StopRequest>,
    ) -> Result<Response<generated::StopResponse>, Status> {
        info!("Stop called");
        let error = match self.provider.stop().await {
            Ok(()) => String::new(),
            Err(e) => {
                error!(error = %e, "Stop failed");
                e.to_string()
            },
        };
        Ok(Response::new(generated::StopResponse { error }))
    }

    #[instrument(skip(self, request), fields(resource_type = tracing::field::Empty), name = "grpc.validate_resource_config")]
    async fn validate_resource_config(
        &self,
        request: Request<generated::ValidateResourceConfigRequest>,
    ) -> Result<Response<generated::ValidateResourceConfigResponse>, Status> {
        let req = request.into_inner();
        tracing::Span::current().record("resource_type", req.resource_type.as_str());

        let result = match decode(&req.config) {
            Ok(config) => {
                self.provider
                    .validate_resource_config(&req.resource_type, config)
                    .await
            },
            Err(e) => Err(e),
        };

        let diagnostics = match result {
            Ok(diagnostics) => {
                log_diagnostics("ValidateResourceConfig", &diagnostics);
                diagnostics_to_proto(diagnostics)
            },
            Err(e) => {
                error!(error = %e, "ValidateResourceConfig failed");
                error_to_proto(&e)
            },
        };
        Ok(Response::new(generated::ValidateResourceConfigResponse {
            diagnostics,
        }))
    }

    #[instrument(skip(self, request), fields(resource_type = tracing::field::Empty), name = "grpc.plan")]
    async fn plan(
        &self,
        request: Request<generated::PlanRequest>,
    ) -> Result<Response<generated::PlanResponse>, Status> {
        let req = request.into_inner();
        tracing::Span::current().record("resource_type", req.resource_type.as_str());
        debug!(is_create = req.prior_state.is_empty(), "Plan called");

        let response = self.plan_inner(&req).await.unwrap_or_else(|e| {
            error!(error = %e, "Plan failed");
            generated::PlanResponse {
                diagnostics: error_to_proto(&e),
                ..Default::default()
            }
        });
        Ok(Response::new(response))
    }

    #[instrument(skip(self, request), fields(resource_type = tracing::field::Empty), name = "grpc.create")]
    async fn create(
        &self,
        request: Request<generated::CreateRequest>,
    ) -> Result<Response<generated::CreateResponse>, Status> {
        let req = request.into_inner();
        tracing::Span::current().record("resource_type", req.resource_type.as_str());
        info!("Create called");

        let response = match self.create_inner(&req).await {
            Ok(state) => {
                info!("Create completed successfully");
                generated::CreateResponse {
                    state,
                    diagnostics: vec![],
                }
            },
            Err(e) => {
                error!(error = %e, "Create failed");
                generated::CreateResponse {
                    state: vec![],
                    diagnostics: error_to_proto(&e),
                }
            },
        };
        Ok(Response::new(response))
    }

    #[instrument(skip(self, request), fields(resource_type = tracing::field::Empty), name = "grpc.read")]
    async fn read(
        &self,
        request: Request<generated::ReadRequest>,
    ) -> Result<Response<generated::ReadResponse>, Status> {
        let req = request.into_inner();
        tracing::Span::current().record("resource_type", req.resource_type.as_str());

        let response = match self.read_inner(&req).await {
            Ok(state) => {
                debug!("Read completed successfully");
                generated::ReadResponse {
                    state,
                    diagnostics: vec![],
                }
            },
            Err(e) if e.is_not_found() => {
                // Empty state with a warning: the engine drops the resource.
                warn!(error = %e, "Resource no longer exists");
                generated::ReadResponse {
                    state: vec![],
                    diagnostics: vec![diagnostic_to_proto(
                        Diagnostic::warning(e.title()).with_detail(e.message()),
                    )],
                }
            },
            Err(e) => {
                error!(error = %e, "Read failed");
                generated::ReadResponse {
                    state: vec![],
                    diagnostics: error_to_proto(&e),
                }
            },
        };
        Ok(Response::new(response))
    }

    #[instrument(skip(self, request), fields(resource_type = tracing::field::Empty), name = "grpc.update")]
    async fn update(
        &self,
        request: Request<generated::UpdateRequest>,
    ) -> Result<Response<generated::UpdateResponse>, Status> {
        let req = request.into_inner();
        tracing::Span::current().record("resource_type", req.resource_type.as_str());
        info!("Update called");

        let response = match self.update_inner(&req).await {
            Ok(state) => {
                info!("Update completed successfully");
                generated::UpdateResponse {
                    state,
                    diagnostics: vec![],
                }
            },
            Err(e) => {
                error!(error = %e, "Update failed");
                generated::UpdateResponse {
                    state: vec![],
                    diagnostics: error_to_proto(&e),
                }
            },
        };
        Ok(Response::new(response))
    }

    #[instrument(skip(self, request), fields(resource_type = tracing::field::Empty), name = "grpc.delete")]
    async fn delete(
        &self,
        request: Request<generated::DeleteRequest>,
    ) -> Result<Response<generated::DeleteResponse>, Status> {
        let req = request.into_inner();
        tracing::Span::current().record("resource_type", req.resource_type.as_str());
        info!("Delete called");

        let diagnostics = match self.delete_inner(&req).await {
            Ok(()) => {
                info!("Delete completed successfully");
                vec![]
            },
            Err(e) => {
                error!(error = %e, "Delete failed");
                error_to_proto(&e)
            },
        };
        Ok(Response::new(generated::DeleteResponse { diagnostics }))
    }

    #[instrument(skip(self, request), fields(resource_type = tracing::field::Empty, id = tracing::field::Empty), name = "grpc.import_resource_state")]
    async fn import_resource_state(
        &self,
        request: Request<generated::ImportResourceStateRequest>,
    ) -> Result<Response<generated::ImportResourceStateResponse>, Status> {
        let req = request.into_inner();
        let span = tracing::Span::current();
        span.record("resource_type", req.resource_type.as_str());
        span.record("id", req.id.as_str());
        info!("ImportResourceState called");

        let response = match self.import_inner(&req).await {
            Ok(imported) => {
                info!(imported_count = imported.len(), "ImportResourceState completed");
                generated::ImportResourceStateResponse {
                    imported,
                    diagnostics: vec![],
                }
            },
            Err(e) => {
                error!(error = %e, "ImportResourceState failed");
                generated::ImportResourceStateResponse {
                    imported: vec![],
                    diagnostics: error_to_proto(&e),
                }
            },
        };
        Ok(Response::new(response))
    }

    #[instrument(skip(self, request), fields(data_source_type = tracing::field::Empty), name = "grpc.read_data_source")]
    async fn read_data_source(
        &self,
        request: Request<generated::ReadDataSourceRequest>,
    ) -> Result<Response<generated::ReadDataSourceResponse>, Status> {
        let req = request.into_inner();
        tracing::Span::current().record("data_source_type", req.data_source_type.as_str());

        let response = match self.read_data_source_inner(&req).await {
            Ok(state) => {
                info!("ReadDataSource completed successfully");
                generated::ReadDataSourceResponse {
                    state,
                    diagnostics: vec![],
                }
            },
            Err(e) => {
                error!(error = %e, "ReadDataSource failed");
                generated::ReadDataSourceResponse {
                    state: vec![],
                    diagnostics: error_to_proto(&e),
                }
            },
        };
        Ok(Response::new(response))
    }
}

/// Options for configuring the provider server.
#[derive(Debug, Clone)]
pub struct ServeOptions {
    /// How long in-flight requests may run after a shutdown signal.
    /// Default: 30 seconds.
    pub shutdown_timeout: Duration,
}

impl Default for ServeOptions {
    fn default() -> Self {
        Self {
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl ServeOptions {
    /// Create new serve options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the shutdown timeout.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

/// Wait for SIGTERM or SIGINT (CTRL+C on Windows).
///
/// If the handlers cannot be installed the server keeps running until the
/// engine kills the process.
async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let handlers = signal(SignalKind::terminate())
            .and_then(|term| signal(SignalKind::interrupt()).map(|int| (term, int)));
        match handlers {
            Ok((mut sigterm, mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => info!("Received SIGTERM, initiating graceful shutdown"),
                    _ = sigint.recv() => info!("Received SIGINT, initiating graceful shutdown"),
                }
            },
            Err(e) => {
                warn!(error = %e, "Failed to install signal handlers");
                std::future::pending::<()>().await;
            },
        }
    }

    #[cfg(windows)]
    {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received CTRL+C, initiating graceful shutdown"),
            Err(e) => {
                warn!(error = %e, "Failed to install CTRL+C handler");
                std::future::pending::<()>().await;
            },
        }
    }

    #[cfg(not(any(unix, windows)))]
    {
        std::future::pending::<()>().await;
    }
}

/// Serve a provider on an ephemeral localhost port.
///
/// Prints `HEMMER_PROVIDER|<version>|<address>` to stdout once the listener
/// is bound, then serves until a shutdown signal arrives.
pub async fn serve<P: ProviderService>(provider: P) -> Result<(), Box<dyn std::error::Error>> {
    serve_with_options(provider, ServeOptions::default()).await
}

/// Like [`serve`], with custom options.
pub async fn serve_with_options<P: ProviderService>(
    provider: P,
    options: ServeOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    serve_on_listener(provider, listener, options).await
}

/// Serve a provider on a specific address.
pub async fn serve_on<P: ProviderService>(
    provider: P,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind(addr).await?;
    serve_on_listener(provider, listener, ServeOptions::default()).await
}

async fn serve_on_listener<P: ProviderService>(
    provider: P,
    listener: TcpListener,
    options: ServeOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let addr = listener.local_addr()?;
    println!("{}", handshake_line(addr));
    info!(address = %addr, "Provider server starting");

    let provider = Arc::new(provider);
    let service = generated::provider_server::ProviderServer::new(ProviderGrpcService {
        provider: Arc::clone(&provider),
    });

    let (signalled_tx, signalled_rx) = oneshot::channel::<()>();
    let server = Server::builder()
        .add_service(service)
        .serve_with_incoming_shutdown(
            tokio_stream::wrappers::TcpListenerStream::new(listener),
            async move {
                wait_for_shutdown_signal().await;
                let _ = signalled_tx.send(());
            },
        );
    tokio::pin!(server);

    // The drain timeout only starts once a signal has arrived.
    tokio::select! {
        result = &mut server => result?,
        _ = signalled_rx => {
            match tokio::time::timeout(options.shutdown_timeout, &mut server).await {
                Ok(Ok(())) => info!("Server shutdown complete"),
                Ok(Err(e)) => {
                    error!(error = %e, "Server error during shutdown");
                    return Err(e.into());
                },
                Err(_) => warn!(
                    timeout = ?options.shutdown_timeout,
                    "Shutdown timeout exceeded, forcing shutdown"
                ),
            }
        },
    }

    debug!("Calling provider stop()");
    if let Err(e) = provider.stop().await {
        warn!(error = %e, "Provider stop() returned error");
    }

    info!("Provider shutdown complete");
    Ok(())
}

fn handshake_line(addr: SocketAddr) -> String {
    format!("{}|{}|{}", HANDSHAKE_PREFIX, PROTOCOL_VERSION, addr)
}
