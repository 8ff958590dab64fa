//! JNI backend for [`ReportEngine`]
//!
//! Owns the embedded JVM. Class handles are resolved once at startup and kept
//! as global references. Worker threads attach once and stay attached until
//! they exit; every call runs inside its own local frame.

use std::path::Path;

use jni::objects::{GlobalRef, JClass, JObject, JString, JValue};
use jni::{InitArgsBuilder, JNIEnv, JNIVersion, JavaVM};
use tracing::{debug, info, warn};

use crate::classpath::Classpath;
use crate::drivers::DriverLoader;
use crate::engine::{DataSource, ReportEngine};
use crate::error::EngineError;
use crate::request::{Locale, ParameterValue, ReportParameters};
use crate::settings::ConnectionEntry;

const COMPILE_MANAGER: &str = "net/sf/jasperreports/engine/JasperCompileManager";
const FILL_MANAGER: &str = "net/sf/jasperreports/engine/JasperFillManager";
const EXPORT_MANAGER: &str = "net/sf/jasperreports/engine/JasperExportManager";
const EMPTY_DATA_SOURCE: &str = "net/sf/jasperreports/engine/JREmptyDataSource";
const HASH_MAP: &str = "java/util/HashMap";
const LOCALE: &str = "java/util/Locale";
const DRIVER_MANAGER: &str = "java/sql/DriverManager";
const CLASS_LOADER: &str = "java/lang/ClassLoader";

const FILL_WITH_CONNECTION: &str =
    "(Ljava/lang/String;Ljava/util/Map;Ljava/sql/Connection;)Lnet/sf/jasperreports/engine/JasperPrint;";
const FILL_WITH_DATA_SOURCE: &str = "(Ljava/lang/String;Ljava/util/Map;Lnet/sf/jasperreports/engine/JRDataSource;)Lnet/sf/jasperreports/engine/JasperPrint;";

const LOCAL_FRAME_CAPACITY: i32 = 32;

/// Convert a pending Java exception into [`EngineError::Java`]
trait JavaResultExt<T> {
    fn check(self, env: &mut JNIEnv) -> Result<T, EngineError>;
}

impl<T> JavaResultExt<T> for jni::errors::Result<T> {
    fn check(self, env: &mut JNIEnv) -> Result<T, EngineError> {
        match self {
            Ok(value) => Ok(value),
            Err(jni::errors::Error::JavaException) => Err(take_exception(env)),
            Err(other) => Err(other.into()),
        }
    }
}

fn take_exception(env: &mut JNIEnv) -> EngineError {
    let throwable = match env.exception_occurred() {
        Ok(throwable) if !throwable.is_null() => throwable,
        _ => return EngineError::Java("exception raised without a throwable".into()),
    };
    if let Err(err) = env.exception_clear() {
        return err.into();
    }

    let message = env
        .call_method(&throwable, "toString", "()Ljava/lang/String;", &[])
        .and_then(|value| value.l())
        .and_then(|obj| {
            let text = JString::from(obj);
            env.get_string(&text).map(String::from)
        });

    match message {
        Ok(message) => EngineError::Java(message),
        Err(_) => {
            let _ = env.exception_clear();
            EngineError::Java("exception without a readable message".into())
        }
    }
}

fn class_of(global: &GlobalRef) -> &JClass<'static> {
    <&JClass>::from(global.as_obj())
}

fn new_path_string<'local>(
    env: &mut JNIEnv<'local>,
    path: &Path,
) -> Result<JString<'local>, EngineError> {
    let path = path.to_str().ok_or_else(|| {
        EngineError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("path is not valid UTF-8: {}", path.display()),
        ))
    })?;
    Ok(env.new_string(path)?)
}

/// Global references to the classes used per request
struct EngineClasses {
    compile_manager: GlobalRef,
    fill_manager: GlobalRef,
    export_manager: GlobalRef,
    empty_data_source: GlobalRef,
    hash_map: GlobalRef,
    locale: GlobalRef,
    driver_manager: GlobalRef,
}

impl EngineClasses {
    fn resolve(env: &mut JNIEnv) -> Result<Self, EngineError> {
        Ok(Self {
            compile_manager: global_class(env, COMPILE_MANAGER)?,
            fill_manager: global_class(env, FILL_MANAGER)?,
            export_manager: global_class(env, EXPORT_MANAGER)?,
            empty_data_source: global_class(env, EMPTY_DATA_SOURCE)?,
            hash_map: global_class(env, HASH_MAP)?,
            locale: global_class(env, LOCALE)?,
            driver_manager: global_class(env, DRIVER_MANAGER)?,
        })
    }
}

fn global_class(env: &mut JNIEnv, name: &str) -> Result<GlobalRef, EngineError> {
    let class = env.find_class(name).map_err(|err| match err {
        jni::errors::Error::JavaException => {
            let _ = env.exception_clear();
            EngineError::ClassNotFound(name.replace('/', "."))
        }
        other => other.into(),
    })?;
    debug!("Resolved {}", name);
    Ok(env.new_global_ref(class)?)
}

/// A filled `JasperPrint`, pinned by a global reference
pub struct JvmFilledReport(GlobalRef);

/// JasperReports running in an embedded JVM
pub struct JvmEngine {
    vm: JavaVM,
    classes: EngineClasses,
}

impl JvmEngine {
    /// Start the JVM with `classpath` plus extra options, then resolve the
    /// JasperReports entry points.
    pub fn start(classpath: &Classpath, options: &[String]) -> Result<Self, EngineError> {
        let classpath_option = classpath
            .to_jvm_option()
            .map_err(|e| EngineError::Startup(e.to_string()))?;

        let mut builder = InitArgsBuilder::new()
            .version(JNIVersion::V8)
            .option(classpath_option.as_str());
        for option in options {
            builder = builder.option(option.as_str());
        }
        let args = builder
            .build()
            .map_err(|e| EngineError::Startup(e.to_string()))?;

        info!(
            "Starting JVM with {} classpath entries and {} extra options",
            classpath.len(),
            options.len()
        );
        let vm = JavaVM::new(args).map_err(|e| EngineError::Startup(e.to_string()))?;

        let classes = {
            let mut env = vm.attach_current_thread()?;
            EngineClasses::resolve(&mut env)?
        };
        info!("JasperReports classes resolved");

        Ok(Self { vm, classes })
    }

    /// JNI environment for the current thread, attaching it on first use
    fn env(&self) -> Result<JNIEnv<'_>, EngineError> {
        Ok(self.vm.attach_current_thread_permanently()?)
    }

    fn parameter_map<'local>(
        &self,
        env: &mut JNIEnv<'local>,
        parameters: &ReportParameters,
    ) -> Result<JObject<'local>, EngineError> {
        let map = env
            .new_object(class_of(&self.classes.hash_map), "()V", &[])
            .check(env)?;

        for (name, value) in parameters {
            let key = env.new_string(name.as_str())?;
            let value = match value {
                ParameterValue::Text(text) => JObject::from(env.new_string(text.as_str())?),
                ParameterValue::Locale(locale) => self.new_locale(env, locale)?,
            };
            env.call_method(
                &map,
                "put",
                "(Ljava/lang/Object;Ljava/lang/Object;)Ljava/lang/Object;",
                &[JValue::Object(&key), JValue::Object(&value)],
            )
            .check(env)?;
        }

        Ok(map)
    }

    fn new_locale<'local>(
        &self,
        env: &mut JNIEnv<'local>,
        locale: &Locale,
    ) -> Result<JObject<'local>, EngineError> {
        let class = class_of(&self.classes.locale);
        let language = env.new_string(locale.language.as_str())?;

        let created = match (&locale.country, &locale.variant) {
            (Some(country), Some(variant)) => {
                let country = env.new_string(country.as_str())?;
                let variant = env.new_string(variant.as_str())?;
                env.new_object(
                    class,
                    "(Ljava/lang/String;Ljava/lang/String;Ljava/lang/String;)V",
                    &[
                        JValue::Object(&language),
                        JValue::Object(&country),
                        JValue::Object(&variant),
                    ],
                )
            }
            (Some(country), None) => {
                let country = env.new_string(country.as_str())?;
                env.new_object(
                    class,
                    "(Ljava/lang/String;Ljava/lang/String;)V",
                    &[JValue::Object(&language), JValue::Object(&country)],
                )
            }
            (None, _) => env.new_object(
                class,
                "(Ljava/lang/String;)V",
                &[JValue::Object(&language)],
            ),
        };

        created.check(env)
    }

    fn open_connection<'local>(
        &self,
        env: &mut JNIEnv<'local>,
        descriptor: &ConnectionEntry,
    ) -> Result<JObject<'local>, EngineError> {
        let url = env.new_string(descriptor.jdbc.as_str())?;
        let user = env.new_string(descriptor.user.as_str())?;
        let password = env.new_string(descriptor.password.as_str())?;

        let connection = env
            .call_static_method(
                class_of(&self.classes.driver_manager),
                "getConnection",
                "(Ljava/lang/String;Ljava/lang/String;Ljava/lang/String;)Ljava/sql/Connection;",
                &[
                    JValue::Object(&url),
                    JValue::Object(&user),
                    JValue::Object(&password),
                ],
            )
            .check(env)?
            .l()?;
        Ok(connection)
    }

    fn close_connection(&self, env: &mut JNIEnv, connection: &JObject, name: &str) {
        match env.call_method(connection, "close", "()V", &[]).check(env) {
            Ok(_) => debug!("Closed connection {}", name),
            Err(err) => warn!("Failed to close connection {}: {}", name, err),
        }
    }

    fn fill_report<'local>(
        &self,
        env: &mut JNIEnv<'local>,
        artifact: &JString,
        parameters: &JObject,
        source: &JObject,
        signature: &str,
    ) -> Result<JObject<'local>, EngineError> {
        let print = env
            .call_static_method(
                class_of(&self.classes.fill_manager),
                "fillReport",
                signature,
                &[
                    JValue::Object(artifact),
                    JValue::Object(parameters),
                    JValue::Object(source),
                ],
            )
            .check(env)?
            .l()?;

        if print.is_null() {
            return Err(EngineError::Output("fillReport returned null".into()));
        }
        Ok(print)
    }
}

impl ReportEngine for JvmEngine {
    type Filled = JvmFilledReport;

    fn compile(&self, template: &Path, artifact: &Path) -> Result<(), EngineError> {
        let mut env = self.env()?;
        env.with_local_frame(LOCAL_FRAME_CAPACITY, |env| -> Result<(), EngineError> {
            let source = new_path_string(env, template)?;
            let target = new_path_string(env, artifact)?;
            env.call_static_method(
                class_of(&self.classes.compile_manager),
                "compileReportToFile",
                "(Ljava/lang/String;Ljava/lang/String;)V",
                &[JValue::Object(&source), JValue::Object(&target)],
            )
            .check(env)?;
            Ok(())
        })
    }

    fn fill(
        &self,
        artifact: &Path,
        parameters: &ReportParameters,
        source: &DataSource,
    ) -> Result<JvmFilledReport, EngineError> {
        let mut env = self.env()?;
        env.with_local_frame(
            LOCAL_FRAME_CAPACITY,
            |env| -> Result<JvmFilledReport, EngineError> {
                let artifact = new_path_string(env, artifact)?;
                let parameters = self.parameter_map(env, parameters)?;

                let print = match source {
                    DataSource::Connection { name, descriptor } => {
                        let connection = self.open_connection(env, descriptor)?;
                        debug!("Opened connection {}", name);
                        let filled = self.fill_report(
                            env,
                            &artifact,
                            &parameters,
                            &connection,
                            FILL_WITH_CONNECTION,
                        );
                        self.close_connection(env, &connection, name);
                        filled?
                    }
                    DataSource::Empty => {
                        let empty = env
                            .new_object(class_of(&self.classes.empty_data_source), "()V", &[])
                            .check(env)?;
                        self.fill_report(env, &artifact, &parameters, &empty, FILL_WITH_DATA_SOURCE)?
                    }
                };

                Ok(JvmFilledReport(env.new_global_ref(&print)?))
            },
        )
    }

    fn export_pdf(&self, filled: &JvmFilledReport, output: &Path) -> Result<(), EngineError> {
        let mut env = self.env()?;
        env.with_local_frame(LOCAL_FRAME_CAPACITY, |env| -> Result<(), EngineError> {
            let output = new_path_string(env, output)?;
            env.call_static_method(
                class_of(&self.classes.export_manager),
                "exportReportToPdfFile",
                "(Lnet/sf/jasperreports/engine/JasperPrint;Ljava/lang/String;)V",
                &[JValue::Object(filled.0.as_obj()), JValue::Object(&output)],
            )
            .check(env)?;
            Ok(())
        })
    }
}

impl DriverLoader for JvmEngine {
    fn load_driver(&self, class_name: &str) -> Result<(), EngineError> {
        let mut env = self.env()?;
        env.with_local_frame(LOCAL_FRAME_CAPACITY, |env| -> Result<(), EngineError> {
            let loader = env
                .call_static_method(
                    CLASS_LOADER,
                    "getSystemClassLoader",
                    "()Ljava/lang/ClassLoader;",
                    &[],
                )
                .check(env)?
                .l()?;
            let name = env.new_string(class_name)?;
            let class = env
                .call_method(
                    &loader,
                    "loadClass",
                    "(Ljava/lang/String;)Ljava/lang/Class;",
                    &[JValue::Object(&name)],
                )
                .check(env)?
                .l()?;

            let class = JClass::from(class);
            env.new_object(&class, "()V", &[]).check(env)?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Only one JVM may be created per process, so every check shares it.
    #[test]
    #[ignore = "needs a JDK; run with JAVA_HOME set and --ignored"]
    fn java_failures_map_to_engine_errors() {
        if std::env::var_os("JAVA_HOME").is_none() {
            return;
        }

        let args = InitArgsBuilder::new()
            .version(JNIVersion::V8)
            .build()
            .unwrap();
        let vm = JavaVM::new(args).unwrap();
        let mut env = vm.attach_current_thread().unwrap();

        let err = match EngineClasses::resolve(&mut env) {
            Ok(_) => panic!("JasperReports should not be on an empty classpath"),
            Err(err) => err,
        };
        assert!(
            matches!(&err, EngineError::ClassNotFound(name)
                if name == "net.sf.jasperreports.engine.JasperCompileManager"),
            "unexpected error: {}",
            err
        );

        let text = env.new_string("not a number").unwrap();
        let err = env
            .call_static_method(
                "java/lang/Integer",
                "parseInt",
                "(Ljava/lang/String;)I",
                &[JValue::Object(&text)],
            )
            .check(&mut env)
            .unwrap_err();
        assert!(
            matches!(&err, EngineError::Java(message) if message.contains("NumberFormatException")),
            "unexpected error: {}",
            err
        );
        assert!(!env.exception_check().unwrap());
    }
}
