use std::sync::Arc;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use jaxws_description::description::{
    config::{ConfigurationScope, DescriptionConfig},
    core::{CallerScope, EndpointUpdate, ServiceDescriptor, ServiceRequest},
    facts::{ClassFacts, FactsCatalog, MethodFacts, WebServiceFacts},
    infrastructure::naming::QName,
    services::DescriptionRegistry,
};

const NS: &str = "http://example.com/bench";

const WSDL: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<wsdl:definitions xmlns:wsdl="http://schemas.xmlsoap.org/wsdl/"
    xmlns:soap="http://schemas.xmlsoap.org/wsdl/soap/"
    xmlns:tns="http://example.com/bench"
    targetNamespace="http://example.com/bench">
  <wsdl:message name="echo"><wsdl:part name="parameters" element="tns:echo"/></wsdl:message>
  <wsdl:message name="echoResponse"><wsdl:part name="parameters" element="tns:echoResponse"/></wsdl:message>
  <wsdl:portType name="Echo">
    <wsdl:operation name="echo">
      <wsdl:input message="tns:echo"/>
      <wsdl:output message="tns:echoResponse"/>
    </wsdl:operation>
  </wsdl:portType>
  <wsdl:binding name="EchoBinding" type="tns:Echo">
    <soap:binding style="document" transport="http://schemas.xmlsoap.org/soap/http"/>
    <wsdl:operation name="echo">
      <soap:operation soapAction="urn:echo"/>
      <wsdl:input><soap:body use="literal"/></wsdl:input>
      <wsdl:output><soap:body use="literal"/></wsdl:output>
    </wsdl:operation>
  </wsdl:binding>
  <wsdl:service name="EchoService">
    <wsdl:port name="EchoPort" binding="tns:EchoBinding">
      <soap:address location="http://localhost/echo"/>
    </wsdl:port>
  </wsdl:service>
</wsdl:definitions>"#;

fn scope() -> Arc<ConfigurationScope> {
    ConfigurationScope::new(DescriptionConfig::default().with_resource("echo.wsdl", WSDL))
}

fn request() -> ServiceRequest {
    ServiceRequest::new(QName::new(NS, "EchoService")).with_wsdl_location("echo.wsdl")
}

fn implementation(methods: usize) -> ClassFacts {
    (0..methods).fold(
        ClassFacts::new("com.example.bench.Echo").with_web_service(WebServiceFacts {
            target_namespace: Some(NS.into()),
            ..Default::default()
        }),
        |class, i| class.with_method(MethodFacts::new(&format!("op{}", i), "java.lang.String").param("java.lang.String")),
    )
}

fn bench_registry_hit(c: &mut Criterion) {
    let registry = DescriptionRegistry::new();
    let scope = scope();
    let _held = registry.get_or_create(&scope, request(), None).unwrap();
    c.bench_function("registry_hit", |b| {
        b.iter(|| black_box(registry.get_or_create(&scope, request(), None).unwrap()));
    });
}

fn bench_registry_acquire_release(c: &mut Criterion) {
    let registry = DescriptionRegistry::new();
    let scope = scope();
    c.bench_function("registry_acquire_release", |b| {
        b.iter(|| {
            let handle = registry.get_or_create(&scope, request(), None).unwrap();
            black_box(handle.release().unwrap())
        });
    });
}

fn bench_create_dispatch_per_caller(c: &mut Criterion) {
    let registry = DescriptionRegistry::new();
    let scope = scope();
    let handle = registry.get_or_create(&scope, request(), None).unwrap();
    let port = QName::new(NS, "EchoPort");
    c.bench_function("create_dispatch_per_caller", |b| {
        b.iter(|| {
            let caller = CallerScope::new();
            black_box(handle.update_endpoint(EndpointUpdate::create_dispatch(port.clone()), Some(&caller)).unwrap())
        });
    });
}

fn bench_dispatch_table_build(c: &mut Criterion) {
    let catalog = Arc::new(FactsCatalog::new().with(implementation(64)));
    let scope = ConfigurationScope::new(DescriptionConfig::default().with_generate_wsdl(false));
    c.bench_function("dispatch_table_build_64_operations", |b| {
        b.iter(|| {
            let service = ServiceDescriptor::server(catalog.clone(), "com.example.bench.Echo", &scope).unwrap();
            let graph = service.snapshot();
            let interface = graph.endpoints()[0].require_interface().unwrap();
            black_box(interface.dispatchable_operation("op63").len())
        });
    });
}

criterion_group!(
    benches,
    bench_registry_hit,
    bench_registry_acquire_release,
    bench_create_dispatch_per_caller,
    bench_dispatch_table_build,
);
criterion_main!(benches);
