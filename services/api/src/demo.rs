use crate::infra::{CounterBoard, DiskMedia, TokenRegistry};
use clap::Args;
use estate_hub::error::AppError;
use estate_hub::listings::{
    authenticate, Caller, ImageUpload, InMemoryPropertyStore, LifecycleError, ListingEngineConfig,
    ListingService, PropertyChanges, PropertyDraft, PropertyFilter, PropertyView,
};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::sync::Arc;

type DemoService = ListingService<InMemoryPropertyStore, DiskMedia, CounterBoard>;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Let the owner keep editing after publishing.
    #[arg(long)]
    pub(crate) allow_owner_edit_after_publish: bool,
    /// Directory for uploaded demo images (defaults to a temp directory).
    #[arg(long)]
    pub(crate) media_root: Option<PathBuf>,
    /// Print each projection as JSON.
    #[arg(long)]
    pub(crate) json: bool,
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let media_root = args
        .media_root
        .clone()
        .unwrap_or_else(|| std::env::temp_dir().join("estate-hub-demo"));
    let counters = Arc::new(CounterBoard::default());
    let service = ListingService::new(
        Arc::new(InMemoryPropertyStore::new()),
        Arc::new(DiskMedia::new(&media_root)),
        counters.clone(),
        ListingEngineConfig {
            allow_owner_edit_after_publish: args.allow_owner_edit_after_publish,
            ..ListingEngineConfig::default()
        },
    );

    let registry = TokenRegistry::seeded().map_err(LifecycleError::from)?;
    let admin = caller(&registry, "demo-admin").await?;
    let owner = caller(&registry, "demo-owner").await?;
    let renter = caller(&registry, "demo-user").await?;

    println!("Listing lifecycle demo");
    println!(
        "  Owner edits after publish: {}",
        if args.allow_owner_edit_after_publish {
            "allowed"
        } else {
            "drafts only"
        }
    );
    println!("  Media directory: {}", media_root.display());

    let draft = service
        .create_draft(
            &owner,
            PropertyDraft {
                title: "Cozy Flat".to_string(),
                description: "Bright one-bedroom with a reading nook and a south balcony."
                    .to_string(),
                location: "Coimbra, Baixa".to_string(),
                price: Decimal::ZERO,
            },
        )
        .await?;
    show(&args, "Draft created", &draft);

    match service.publish(&draft.id, &owner).await {
        Err(LifecycleError::ValidationFailed(reason)) => {
            println!("  Publish refused: {reason}");
        }
        Err(other) => return Err(other.into()),
        Ok(view) => show(&args, "Published unexpectedly", &view),
    }

    let priced = service
        .update_draft(
            &draft.id,
            &owner,
            PropertyChanges {
                price: Some(Decimal::new(500, 0)),
                ..PropertyChanges::default()
            },
        )
        .await?;
    show(&args, "Price set", &priced);

    let report = service
        .upload_images(
            &draft.id,
            &owner,
            vec![
                ImageUpload::new("living-room.png", "image/png", sample_png()),
                ImageUpload::new("floorplan.gif", "image/gif", vec![0x47, 0x49, 0x46]),
            ],
        )
        .await?;
    println!("  Upload: {}", report.summary());
    for failure in &report.failures {
        println!("    - {} rejected: {}", failure.file_name, failure.reason);
    }

    let published = service.publish(&draft.id, &owner).await?;
    show(&args, "Published", &published);

    counters.favorite(draft.id);
    counters.message(draft.id);
    print_listing(&service, "Renter browse", &renter).await?;

    let archived = service.archive(&draft.id, &admin).await?;
    show(&args, "Archived by admin", &archived);
    print_listing(&service, "Renter browse", &renter).await?;

    let deleted = service.soft_delete(&draft.id, &owner).await?;
    show(&args, "Deleted by owner", &deleted);
    match service.get_property(&draft.id, Some(&owner)).await {
        Err(LifecycleError::NotFound) => println!("  Owner lookup after delete: not found"),
        Err(other) => return Err(other.into()),
        Ok(view) => show(&args, "Still visible", &view),
    }

    let restored = service.restore(&draft.id, &admin).await?;
    show(&args, "Restored by admin", &restored);

    for image in &restored.images {
        service.delete_image(&image.id, &owner).await?;
    }
    println!("  Demo images removed from {}", media_root.display());

    Ok(())
}

async fn caller(registry: &TokenRegistry, token: &str) -> Result<Caller, AppError> {
    let header = format!("Bearer {token}");
    authenticate(registry, Some(header.as_str()))
        .await?
        .ok_or_else(|| LifecycleError::Unauthenticated.into())
}

async fn print_listing(
    service: &DemoService,
    label: &str,
    caller: &Caller,
) -> Result<(), AppError> {
    let page = service
        .list_properties(&PropertyFilter::default(), Some(caller))
        .await?;
    println!(
        "  {label}: {} of {} listing(s) visible",
        page.data.len(),
        page.pagination.total
    );
    for view in &page.data {
        println!(
            "    - {} [{}] {} at {} ({} favorites, {} messages)",
            view.title, view.status, view.location, view.price, view.favorites_count, view.messages_count
        );
    }
    Ok(())
}

fn show(args: &DemoArgs, label: &str, view: &PropertyView) {
    println!(
        "  {label}: {} -> {} (price {}, {} image(s))",
        view.id,
        view.status,
        view.price,
        view.images.len()
    );
    if args.json {
        match serde_json::to_string_pretty(view) {
            Ok(json) => println!("{json}"),
            Err(err) => println!("  Projection unavailable: {err}"),
        }
    }
}

fn sample_png() -> Vec<u8> {
    vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn demo_walks_the_full_lifecycle_and_cleans_up_media() {
        for allow in [false, true] {
            let root = std::env::temp_dir().join(format!("estate-hub-demo-{}", uuid::Uuid::new_v4()));
            run_demo(DemoArgs {
                allow_owner_edit_after_publish: allow,
                media_root: Some(root.clone()),
                json: false,
            })
            .await
            .expect("demo completes");

            let mut entries = tokio::fs::read_dir(root.join("properties"))
                .await
                .expect("media folder created");
            assert!(entries.next_entry().await.expect("readable").is_none());

            let _ = tokio::fs::remove_dir_all(&root).await;
        }
    }
}
