//! Request dispatch over the resource tree

use super::container::{accept_post, Container, ContainerVariant, ChildPayload, NewChild, Title};
use super::node::{Binary, InteractionModel, Resource};
use super::patch::{PatchOperation, RdfPatch};
use super::prefer::Preferences;
use super::{LdpError, LdpRequest, LdpResponse, LdpResult, Membership};
use crate::manager::ResourceManager;
use crate::rdf::{
    Literal, NamedNode, RdfFormat, RdfObject, RdfPredicate, RdfSerializer, RdfStore, RdfSubject,
    Triple, TriplePattern,
};
use crate::vocab::{
    dcterms, ldp, media, RequestCode, ResponseCode, ATTR_RESOURCE_TYPE, ATTR_TITLE,
    HDR_ACCEPT_PATCH, HDR_ACCEPT_POST, HDR_ALLOW,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// The resource tree of one server, rooted at a basic container on the base URI
pub struct ResourceTree {
    mng: Arc<ResourceManager>,
    root: Arc<Resource>,
}

impl ResourceTree {
    /// Create the root container and record it in the store
    pub async fn new(mng: Arc<ResourceManager>, accepted_non_rdf: Vec<u16>) -> LdpResult<Self> {
        let root = Resource::root(
            mng.base_uri(),
            Container::new(ContainerVariant::Basic, accepted_non_rdf),
        );
        let mut txn = mng.begin().await?;
        txn.add_basic_container(root.uri())?;
        txn.set_created(root.uri())?;
        txn.commit();

        info!("Resource tree rooted at {}", root.uri());
        Ok(Self { mng, root })
    }

    pub fn manager(&self) -> &Arc<ResourceManager> {
        &self.mng
    }

    pub fn root(&self) -> &Arc<Resource> {
        &self.root
    }

    /// Live node at `path`
    pub fn lookup(&self, path: &str) -> Option<Arc<Resource>> {
        let mut node = self.root.clone();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            node = node.child(segment)?;
        }
        Some(node)
    }

    /// Handle one request; failures become error responses
    pub async fn handle(&self, req: LdpRequest) -> LdpResponse {
        let method = req.method;
        let path = req.path.clone();

        match self.dispatch(&req).await {
            Ok(response) => {
                if method.is_read_only() {
                    debug!("{} {} -> {}", method, path, response.code);
                } else {
                    info!("{} {} -> {}", method, path, response.code);
                }
                response
            }
            Err(e) => {
                match &e {
                    LdpError::Internal(_) => error!("{} {} failed: {}", method, path, e),
                    _ => warn!("{} {} rejected: {}", method, path, e),
                }
                LdpResponse::from_error(&e)
            }
        }
    }

    async fn dispatch(&self, req: &LdpRequest) -> LdpResult<LdpResponse> {
        match req.method {
            RequestCode::Get => self.get(req, true).await,
            RequestCode::Head => self.get(req, false).await,
            RequestCode::Options => self.options(req),
            RequestCode::Post => self.post(req).await,
            RequestCode::Put => self.put(req).await,
            RequestCode::Patch => self.patch(req).await,
            RequestCode::Delete => self.delete(req).await,
        }
    }

    fn find(&self, path: &str) -> LdpResult<Arc<Resource>> {
        self.lookup(path)
            .ok_or_else(|| LdpError::NotFound(format!("{} does not exist", path)))
    }

    async fn get(&self, req: &LdpRequest, with_body: bool) -> LdpResult<LdpResponse> {
        let node = self.find(&req.path)?;

        let (content_format, payload) = match node.binary() {
            Some(binary) => {
                if req.accept.is_some_and(|a| a != binary.content_format) {
                    return Err(LdpError::NotAcceptable(req.accept.unwrap_or_default()));
                }
                (binary.content_format, binary.data)
            }
            None => {
                let format = match req.accept {
                    None => RdfFormat::Turtle,
                    Some(accept) => RdfFormat::from_content_format(accept)
                        .ok_or(LdpError::NotAcceptable(accept))?,
                };
                let prefs = Preferences::from_request(req, self.mng.namespaces());
                let store = self.mng.read().await?;
                let triples = representation(&store, &node, &prefs)?;
                drop(store);
                let text = RdfSerializer::serialize(&triples, format)?;
                (format.content_format(), text.into())
            }
        };

        let mut response = LdpResponse::new(ResponseCode::Content)
            .with_payload(content_format, payload)
            .with_etag();
        response.location_query = Some(node.link_query());
        if !with_body {
            response.payload = Default::default();
        }
        Ok(response)
    }

    fn options(&self, req: &LdpRequest) -> LdpResult<LdpResponse> {
        let node = self.find(&req.path)?;

        let mut allow = vec!["GET", "HEAD", "OPTIONS", "PUT"];
        if node.binary().is_none() {
            allow.push("PATCH");
        }
        if node.is_container() {
            allow.push("POST");
        }
        if is_deletable(&node) {
            allow.push("DELETE");
        }

        let mut body = format!("{}: {}\n", HDR_ALLOW, allow.join(", "));
        if let Some(container) = node.as_container() {
            body.push_str(&format!("{}: {}\n", HDR_ACCEPT_POST, accept_post(container).join(", ")));
        }
        if node.binary().is_none() {
            let patch = media::mime(media::RDF_PATCH).unwrap_or_default();
            body.push_str(&format!("{}: {}\n", HDR_ACCEPT_PATCH, patch));
        }

        Ok(LdpResponse::new(ResponseCode::Content).with_payload(media::TEXT_PLAIN, body))
    }

    async fn post(&self, req: &LdpRequest) -> LdpResult<LdpResponse> {
        let node = self.find(&req.path)?;
        if !node.is_container() {
            return Err(LdpError::MethodNotAllowed(RequestCode::Post));
        }
        let title = match req.attribute(ATTR_TITLE) {
            Some(title) => Title::Requested(title.to_string()),
            None => Title::Anonymous,
        };
        self.create(&node, req, title).await
    }

    async fn create(
        &self,
        container: &Arc<Resource>,
        req: &LdpRequest,
        title: Title,
    ) -> LdpResult<LdpResponse> {
        if req.content_format.is_none() {
            return Err(LdpError::BadRequest("Content-Format is required".into()));
        }
        let namespaces = self.mng.namespaces();
        let child = container
            .create_child(&self.mng, title, |c| describe_child(c, req, namespaces))
            .await?;

        Ok(LdpResponse::new(ResponseCode::Created).with_location(child.uri(), child.link_query()))
    }

    async fn put(&self, req: &LdpRequest) -> LdpResult<LdpResponse> {
        if let Some(node) = self.lookup(&req.path) {
            return self.replace(&node, req).await;
        }

        // PUT-to-create: the parent must be a live container
        let (parent_path, title) = req
            .split_last()
            .ok_or_else(|| LdpError::NotFound(req.path.clone()))?;
        let parent = self.find(parent_path)?;
        if !parent.is_container() {
            return Err(LdpError::NotFound(req.path.clone()));
        }
        self.create(&parent, req, Title::Explicit(title.to_string())).await
    }

    async fn replace(&self, node: &Arc<Resource>, req: &LdpRequest) -> LdpResult<LdpResponse> {
        let content_format = req
            .content_format
            .ok_or_else(|| LdpError::BadRequest("Content-Format is required".into()))?;

        if node.binary().is_some() {
            let accepted = node
                .parent()
                .and_then(|p| p.as_container().map(|c| c.accepts(content_format)))
                .unwrap_or(false);
            if !accepted {
                return Err(LdpError::UnsupportedContentFormat(content_format));
            }

            let mut txn = self.mng.begin().await?;
            if node.is_deleted() {
                return Err(LdpError::NotFound(req.path.clone()));
            }
            if let Some(current) = node.binary() {
                check_if_match(req, &current.data)?;
            }
            let format = Literal::new_simple_literal(
                media::mime(content_format)
                    .map(str::to_string)
                    .unwrap_or_else(|| content_format.to_string()),
            );
            let triple = Triple::with_object(node.uri(), dcterms::FORMAT, format.into())?;
            txn.replace_description(node.uri(), vec![triple], |t| {
                t.predicate.as_str() != dcterms::FORMAT
            })?;
            node.set_binary(Binary {
                content_format,
                data: req.payload.clone(),
            });
            txn.commit();
        } else {
            let format = RdfFormat::from_content_format(content_format)
                .ok_or(LdpError::UnsupportedContentFormat(content_format))?;
            let triples: Vec<Triple> = self
                .mng
                .parse(node.uri(), req.text()?, format)?
                .into_iter()
                .filter(|t| node.accepts_client_triple(t, self.mng.base_uri()))
                .collect();

            let mut txn = self.mng.begin().await?;
            if node.is_deleted() {
                return Err(LdpError::NotFound(req.path.clone()));
            }
            if !req.if_match.is_empty() {
                let current = representation(txn.store(), node, &Preferences::default())?;
                let text = RdfSerializer::serialize(&current, RdfFormat::Turtle)?;
                check_if_match(req, text.as_bytes())?;
            }
            node.update_description(&mut txn, |txn| {
                txn.replace_description(node.uri(), triples, |t| node.is_server_managed(t))?;
                Ok(())
            })?;
            txn.commit();
        }

        info!("Replaced {}", node.path());
        Ok(LdpResponse::new(ResponseCode::Changed))
    }

    async fn patch(&self, req: &LdpRequest) -> LdpResult<LdpResponse> {
        let node = self.find(&req.path)?;
        if node.binary().is_some() {
            return Err(LdpError::MethodNotAllowed(RequestCode::Patch));
        }
        match req.content_format {
            None => return Err(LdpError::BadRequest("Content-Format is required".into())),
            Some(media::RDF_PATCH) => {}
            Some(other) => return Err(LdpError::UnsupportedContentFormat(other)),
        }

        let patch = RdfPatch::parse(req.text()?, node.uri())?;
        for op in patch.operations() {
            let triple = op.triple();
            if node.is_server_managed(triple) {
                return Err(LdpError::BadRequest(format!(
                    "{} is managed by the server",
                    triple.predicate
                )));
            }
            if let Some(subject) = triple.subject.as_named_node() {
                if subject.as_str() != node.uri() {
                    return Err(LdpError::BadRequest(format!(
                        "{} is not part of {}",
                        subject,
                        node.path()
                    )));
                }
            }
        }

        let mut txn = self.mng.begin().await?;
        if node.is_deleted() {
            return Err(LdpError::NotFound(req.path.clone()));
        }
        if !req.if_match.is_empty() {
            let current = representation(txn.store(), &node, &Preferences::default())?;
            let text = RdfSerializer::serialize(&current, RdfFormat::Turtle)?;
            check_if_match(req, text.as_bytes())?;
        }
        node.update_description(&mut txn, |txn| {
            for op in patch.operations() {
                match op {
                    PatchOperation::Add(t) => txn.add_statement(t.clone())?,
                    PatchOperation::Delete(t) => txn.remove_statement(t)?,
                };
            }
            Ok(())
        })?;
        txn.commit();

        info!("Patched {} ({} changes)", node.path(), patch.operations().len());
        Ok(LdpResponse::new(ResponseCode::Changed))
    }

    async fn delete(&self, req: &LdpRequest) -> LdpResult<LdpResponse> {
        let node = self.find(&req.path)?;
        node.delete(&self.mng).await?;
        Ok(LdpResponse::new(ResponseCode::Deleted))
    }
}

/// Decide the interaction model and payload of a child from a creation request
fn describe_child(
    container: &Container,
    req: &LdpRequest,
    namespaces: &crate::rdf::NamespaceManager,
) -> LdpResult<NewChild> {
    let content_format = req
        .content_format
        .ok_or_else(|| LdpError::BadRequest("Content-Format is required".into()))?;
    let rt = req
        .attribute(ATTR_RESOURCE_TYPE)
        .map(|t| InteractionModel::from_rt(t, namespaces))
        .transpose()?;

    if let Some(format) = RdfFormat::from_content_format(content_format) {
        let model = rt.unwrap_or(InteractionModel::RdfSource);
        if model == InteractionModel::NonRdfSource {
            return Err(LdpError::BadRequest("rt=ldp:NonRDFSource with an RDF payload".into()));
        }
        return Ok(NewChild {
            payload: ChildPayload::Rdf {
                body: req.text()?.to_string(),
                format,
            },
            ..NewChild::new(model)
        });
    }

    if !container.accepts(content_format) {
        return Err(LdpError::UnsupportedContentFormat(content_format));
    }
    if rt.is_some_and(|m| m.is_container()) {
        return Err(LdpError::BadRequest("Containers need an RDF payload".into()));
    }
    Ok(NewChild {
        payload: ChildPayload::Binary(Binary {
            content_format,
            data: req.payload.clone(),
        }),
        ..NewChild::new(InteractionModel::NonRdfSource)
    })
}

fn is_deletable(node: &Resource) -> bool {
    let Some(parent) = node.parent() else {
        return false;
    };
    match parent.as_container() {
        Some(container) => container
            .variant()
            .membership()
            .map_or(true, |m| m.resource.as_str() != node.uri()),
        None => false,
    }
}

fn check_if_match(req: &LdpRequest, current: &[u8]) -> LdpResult<()> {
    if req.if_match.is_empty() {
        return Ok(());
    }
    let tag = super::etag(current);
    if req.if_match.iter().any(|t| t.is_empty() || *t == tag) {
        Ok(())
    } else {
        Err(LdpError::PreconditionFailed)
    }
}

/// Triples describing `node`, honouring container preferences
fn representation(
    store: &RdfStore,
    node: &Resource,
    prefs: &Preferences,
) -> LdpResult<Vec<Triple>> {
    let subject: RdfSubject = NamedNode::new(node.uri())?.into();
    let mut triples = store.triples_with_subject(&subject);

    if let Some(container) = node.as_container() {
        if !prefs.containment() {
            triples.retain(|t| t.predicate.as_str() != ldp::CONTAINS);
        }
        if prefs.membership() {
            if let Some(membership) = container.variant().membership() {
                triples.extend(membership_triples(store, membership)?);
            }
        }
    }
    Ok(triples)
}

fn membership_triples(store: &RdfStore, membership: &Membership) -> LdpResult<Vec<Triple>> {
    let resource = membership.resource.clone();
    let mut triples = Vec::new();
    if let Some(relation) = &membership.member_relation {
        let pattern = TriplePattern::new(
            Some(resource.clone().into()),
            Some(RdfPredicate::from(relation.clone())),
            None,
        );
        triples.extend(store.query(&pattern));
    }
    if let Some(relation) = &membership.is_member_of_relation {
        let pattern = TriplePattern::new(
            None,
            Some(RdfPredicate::from(relation.clone())),
            Some(RdfObject::from(resource)),
        );
        triples.extend(store.query(&pattern));
    }
    Ok(triples)
}
