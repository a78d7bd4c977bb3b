use wharf_registry::RegistryService;

use crate::utils::yes_no;

pub fn resolve(service: &RegistryService, reference: &str) -> Result<(), Box<dyn std::error::Error>> {
    let info = service
        .resolve_repository(reference)
        .map_err(|e| format!("Failed to resolve {}: {}", reference, e))?;

    println!("Reference:      {}", info.reference);
    println!("Index:          {}", info.index.name);
    println!("  Secure:       {}", yes_no(info.index.secure));
    println!("  Official:     {}", yes_no(info.index.official));
    for mirror in &info.index.mirrors {
        println!("  Mirror:       {}", mirror);
    }
    println!("Remote name:    {}", info.remote_name);
    println!("Local name:     {}", info.local_name);
    println!("Canonical name: {}", info.canonical_name);
    println!("Official image: {}", yes_no(info.official));
    if let Some(digest) = &info.reference.digest {
        println!("Digest:         {}", digest);
    } else {
        println!("Tag:            {}", info.reference.tag_or_default());
    }

    Ok(())
}

pub fn endpoints(
    service: &RegistryService,
    hostname: &str,
    push: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let endpoints = if push {
        service.lookup_push_endpoints(hostname)?
    } else {
        service.lookup_pull_endpoints(hostname)?
    };

    if endpoints.is_empty() {
        println!("No endpoints for: {}", hostname);
        return Ok(());
    }

    println!(
        "{:<45} {:<8} {:<8} {:<10} {:<10}",
        "URL", "VERSION", "MIRROR", "OFFICIAL", "VERIFY TLS"
    );

    for endpoint in endpoints {
        println!(
            "{:<45} {:<8} {:<8} {:<10} {:<10}",
            endpoint.url.as_str(),
            endpoint.version.to_string(),
            yes_no(endpoint.mirror),
            yes_no(endpoint.official),
            yes_no(!endpoint.tls.insecure_skip_verify),
        );
    }

    Ok(())
}
